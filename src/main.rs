use std::path::Path;

use clap::{Parser, Subcommand};
use env_logger::Env;

use subray::models::AdminBook;
use subray::settings::Settings;

/// Proxy configuration and subscription core for an Xray-based control plane
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage admin accounts
    Admins {
        /// List admins
        #[arg(long)]
        list: bool,
        /// Create an admin
        #[arg(long, value_name = "USERNAME")]
        create: Option<String>,
        /// Delete an admin
        #[arg(long, value_name = "USERNAME")]
        delete: Option<String>,
        /// Modify an admin's branding overrides
        #[arg(long, value_name = "USERNAME")]
        modify: Option<String>,
        /// New support URL (with --modify)
        #[arg(long, value_name = "URL")]
        support_url: Option<String>,
        /// New profile title (with --modify)
        #[arg(long, value_name = "TITLE")]
        profile_title: Option<String>,
        /// Reset the aggregate usage counter of an admin
        #[arg(long, value_name = "USERNAME")]
        reset_usage: Option<String>,
    },
    /// Print effective settings and the resolved inbound summary
    System,
    /// Run the subscription web server
    #[cfg(feature = "web-api")]
    Serve,
}

fn run_admins(
    list: bool,
    create: Option<String>,
    delete: Option<String>,
    modify: Option<String>,
    support_url: Option<String>,
    profile_title: Option<String>,
    reset_usage: Option<String>,
) -> anyhow::Result<()> {
    let path = Settings::current().admins_file.clone();
    let mut book = AdminBook::load(Path::new(&path))?;

    if let Some(username) = create {
        book.create(&username)?;
        println!("created '{}'", username);
    }
    if let Some(username) = delete {
        book.delete(&username)?;
        println!("deleted '{}'", username);
    }
    if let Some(username) = modify {
        book.modify(&username, support_url, profile_title)?;
        println!("modified '{}'", username);
    }
    if let Some(username) = reset_usage {
        book.reset_usage(&username)?;
        println!("reset usage of '{}'", username);
    }
    if list {
        for admin in book.list() {
            println!(
                "{}\tusage={}\tsupport_url={}\tprofile_title={}",
                admin.username,
                admin.users_usage,
                admin.support_url.as_deref().unwrap_or("-"),
                admin.profile_title.as_deref().unwrap_or("-"),
            );
        }
    }
    Ok(())
}

fn run_system() -> anyhow::Result<()> {
    let settings = Settings::current();
    println!("listen: {}:{}", settings.listen_address, settings.listen_port);
    println!("subscription prefix: /{}", settings.subscription_prefix);
    println!("xray config: {}", settings.xray_config_path);

    match subray::xray::XrayConfig::from_file(
        Path::new(&settings.xray_config_path),
        &settings.exclude_inbound_tags,
        &settings.fallbacks_inbound_tags,
    ) {
        Ok(config) => {
            println!("inbounds ({}):", config.inbounds().len());
            for inbound in config.inbounds() {
                println!(
                    "  {}\t{}\tport={}\tnetwork={}\ttls={}",
                    inbound.tag,
                    inbound.protocol.as_str(),
                    inbound.port,
                    inbound.network,
                    inbound.tls,
                );
            }
        }
        Err(e) => println!("xray config not loadable: {}", e),
    }
    Ok(())
}

#[cfg(feature = "web-api")]
async fn run_serve() -> anyhow::Result<()> {
    use std::sync::Arc;

    use actix_web::{web, App, HttpServer};
    use log::{info, warn};
    use subray::core::CoreRegistry;
    use subray::hosts::{FileHostSource, HostStore};
    use subray::web::{AppState, FileProvider};

    let settings = Settings::current();
    let registry = Arc::new(CoreRegistry::new());
    let raw = std::fs::read_to_string(&settings.xray_config_path)?;
    let value = serde_json::from_str(&subray::xray::strip_json_comments(&raw))?;
    registry.update(
        "default",
        value,
        &settings.exclude_inbound_tags,
        &settings.fallbacks_inbound_tags,
    )?;

    // Tokens resolve against a JSON user dump; the full control plane swaps
    // in its database-backed provider here.
    let provider = match FileProvider::load(Path::new(&settings.users_file)) {
        Ok(provider) => provider,
        Err(err) => {
            warn!(
                "users file '{}' not loadable ({}), serving an empty user set",
                settings.users_file, err
            );
            FileProvider::default()
        }
    };

    let hosts = Arc::new(HostStore::new());
    let source = FileHostSource::new(settings.hosts_file.clone());
    hosts.refresh(&source).await;
    let refresh_loop = {
        let hosts = Arc::clone(&hosts);
        tokio::spawn(async move { hosts.run_refresh_loop(&source).await })
    };

    let state = Arc::new(AppState {
        provider: Arc::new(provider),
        cores: registry,
        hosts: Arc::clone(&hosts),
    });

    let bind = (settings.listen_address.clone(), settings.listen_port);
    let prefix = format!("/{}", settings.subscription_prefix);
    info!("listening on {}:{}{}", bind.0, bind.1, prefix);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&state)))
            .service(web::scope(&prefix).configure(subray::web::config))
    })
    .bind(bind)?
    .run()
    .await?;

    hosts.stop();
    refresh_loop.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args = Args::parse();
    Settings::init(args.config.as_deref().unwrap_or(""))?;

    match args.command {
        Command::Admins {
            list,
            create,
            delete,
            modify,
            support_url,
            profile_title,
            reset_usage,
        } => run_admins(
            list,
            create,
            delete,
            modify,
            support_url,
            profile_title,
            reset_usage,
        ),
        Command::System => run_system(),
        #[cfg(feature = "web-api")]
        Command::Serve => run_serve().await,
    }
}
