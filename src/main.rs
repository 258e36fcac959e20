fn main() -> anyhow::Result<()> {
    colormode::run()?;
    Ok(())
}
