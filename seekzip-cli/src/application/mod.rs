pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use seekzip_core::error::Result;

pub fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;
    match cli.command {
        Commands::Create {
            archive,
            inputs,
            level,
            list,
            frame_size,
            codec,
            no_checksums,
        } => {
            if list {
                return handlers::handle_list_path(archive);
            }
            handlers::handle_create(
                archive,
                inputs,
                level,
                frame_size,
                codec,
                no_checksums,
                verbose,
            )
        }
        Commands::List { src } => handlers::handle_list(&src),
        Commands::Cat {
            src,
            path,
            start,
            len,
        } => handlers::handle_cat(&src, path, start, len),
        Commands::Get {
            src,
            path,
            out,
            start,
            len,
        } => handlers::handle_get(&src, path, out, start, len),
        Commands::Frames { src } => handlers::handle_frames(&src),
        Commands::Verify { src } => handlers::handle_verify(&src),
    }
}
