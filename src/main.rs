use anyhow::Result;

fn main() -> Result<()> {
    compare_genotypes::cli::run()
}
