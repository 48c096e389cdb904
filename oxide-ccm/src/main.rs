use std::{process::exit, sync::Arc};

use kube::Client;
use oxide_ccm_core::{config::OxideConfig, oxide::OxideHttpClient};

mod controller;
mod helpers;

#[tokio::main]
async fn main() {
    configure_logger();

    let config = get_config();
    let oxide = create_oxide_client(&config);
    let client = create_client().await;

    log::info!("Starting the Oxide cloud controller manager...");

    controller::main_controller(client, oxide, config).await;
}

async fn create_client() -> Client {
    match Client::try_default().await {
        Ok(client) => client,
        Err(error) => {
            log::error!("Couldn't create client! {error:?}");
            exit(6)
        }
    }
}

fn get_config() -> OxideConfig {
    match OxideConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            log::error!("Couldn't retrieve the Oxide configuration! {error:?}");
            exit(7)
        }
    }
}

fn create_oxide_client(config: &OxideConfig) -> Arc<OxideHttpClient> {
    match OxideHttpClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            log::error!("Couldn't create the Oxide API client! {error:?}");
            exit(8)
        }
    }
}

fn configure_logger() {
    env_logger::builder()
        .default_format()
        .format_module_path(false)
        .filter_level(log::LevelFilter::Info)
        .init()
}
