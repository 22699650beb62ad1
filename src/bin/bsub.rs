use clap::Parser;

use cooper::legacy::{self, SubmitArgs};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    legacy::bsub(SubmitArgs::parse())
}
