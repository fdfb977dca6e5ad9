fn main() -> anyhow::Result<()> {
    taskline::cli::run()
}
