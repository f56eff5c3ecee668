use anyhow::Result;

use crate::args::{BuildCommand, Cli, Command, VerifyCommand};

mod compile;
mod verify;

pub fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Build(BuildCommand::Compile {
            source,
            candidates,
            out,
            key,
            namespace,
            publisher_id,
            publisher_name,
            created_at,
            license,
        }) => compile::run(compile::CompileArgs {
            source,
            candidates,
            out,
            key,
            namespace,
            publisher_id,
            publisher_name,
            created_at,
            license,
        }),
        Command::Verify(VerifyCommand::Shard { path, trusted_key, mode }) => {
            verify::run(verify::VerifyArgs { path, trusted_key, mode })
        }
    }
}
