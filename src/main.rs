use std::error::Error;
use vpc_topology::cloud::{gather_facts, AwsCliMetadata, CloudMetadata};
use vpc_topology::config::DEFAULT_CONFIG_FILE;
use vpc_topology::output::{plan_print, print_graph_summary};
use vpc_topology::{build_graph, compute_subnet_plan, load_config, ManifestEngine, ProvisioningEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    log4rs::init_file("log4rs.yml", Default::default()).expect("Error initializing log4rs");
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let config_file =
        std::env::var("STACK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let config = load_config(&config_file)?;

    let metadata = AwsCliMetadata::from_config(&config);
    let zones = metadata.availability_zones()?;
    let plan = compute_subnet_plan(
        &config.network.vpc_cidr,
        config.network.desired_zone_count,
        &zones,
    )?;
    plan_print(&plan)?;

    let facts = gather_facts(&metadata, &config)?;
    let graph = build_graph(&plan, &config, &facts)?;
    print_graph_summary(&graph);

    let engine = ManifestEngine::new(&config.manifest.path);
    let report = engine.submit(&graph).await?;
    log::info!(
        "#End main() engine={} resources={} location={}",
        engine.name(),
        report.resources,
        report.location
    );
    Ok(())
}
