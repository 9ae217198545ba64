use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = gwas_api::Args::parse();

	gwas_api::run(args).await
}
