#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod db;
mod utils;
mod web;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run(cli::Cli::parse()).await
}
