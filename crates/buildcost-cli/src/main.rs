mod command;
mod ingest;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
