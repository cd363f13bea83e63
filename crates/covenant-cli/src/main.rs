fn main() -> anyhow::Result<()> {
    covenant_cli::run()?;
    Ok(())
}
