use anyhow::Result;

fn main() -> Result<()> {
    modforge::cli::run()
}
