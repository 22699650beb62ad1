use clap::Parser;

use cooper::legacy::{self, ListArgs};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    legacy::bjobs(ListArgs::parse())
}
