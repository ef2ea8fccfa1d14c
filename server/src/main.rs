use std::sync::Arc;

use actix::Actor;
use actix_web::{web, App, HttpServer};
use cfg_if::cfg_if;
use clap::Parser;
use shared::log::init_log;
use tracing::*;

use crate::{ledger::LedgerActor, restful::RESTful};

mod ledger;
mod restful;
mod routes;
#[cfg(test)]
mod tests;

cfg_if! {
    if #[cfg(feature = "build-version")] {
        include!(concat!(env!("OUT_DIR"), "/version.rs"));
    } else {
        pub const VERSION: &str = "unknown";
    }
}

#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    #[arg(long, help = "Config the server listen port")]
    port: u16,

    #[arg(long, default_value_t = 1.0, help = "Site-wide difficulty multiplier")]
    multiplier: f64,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_log();

    info!("VERSION:{}", VERSION);

    let args = Args::parse();

    let ledger = LedgerActor::new(args.multiplier).start();

    let restful = Arc::new(RESTful { ledger });

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(restful.clone()))
            .service(routes::validate)
            .service(routes::target)
            .service(routes::difficulty)
            .service(routes::score)
    })
    .workers(4)
    .bind(("0.0.0.0", args.port))?
    .run()
    .await
}
