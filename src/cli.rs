// src/cli.rs

//! CLI definitions for the depot binary
//!
//! Command implementations live in `main.rs`; this module only declares the
//! clap surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "depot")]
#[command(version)]
#[command(about = "Package repository cache with signed indexes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the packages of a repository directory
    List {
        /// Repository directory
        repo: PathBuf,

        /// Name filter; `*` wildcards, otherwise prefix match
        #[arg(short, long)]
        filter: Option<String>,

        /// Hide snapshot versions
        #[arg(long)]
        stable_only: bool,
    },

    /// List all known versions of one package, newest first
    Versions {
        /// Repository directory
        repo: PathBuf,

        /// Package name
        name: String,
    },

    /// Delete one package version from a repository directory
    Delete {
        /// Repository directory
        repo: PathBuf,

        /// Package name
        name: String,

        /// Version; blank selects the latest snapshot overall
        #[arg(short, long, default_value = "")]
        version: String,

        /// Snapshot build timestamp (`yyyyMMdd-HHmm`)
        #[arg(short, long, default_value = "")]
        timestamp: String,
    },

    /// Generate a signing key pair
    Keygen {
        /// Private key output path
        #[arg(long, default_value = "depot.private")]
        private: PathBuf,

        /// Public key (certificate) output path
        #[arg(long, default_value = "depot.public")]
        public: PathBuf,

        /// Human-readable key identifier
        #[arg(long)]
        key_id: Option<String>,
    },

    /// Sign a repository directory's content index
    Sign {
        /// Repository directory
        repo: PathBuf,

        /// Private key path
        #[arg(long)]
        key: PathBuf,

        /// Certificate (public key) path
        #[arg(long)]
        cert: PathBuf,

        /// Where to write the certification JSON
        #[arg(short, long, default_value = "certification.json")]
        output: PathBuf,
    },

    /// Verify a repository directory against a certification
    VerifyIndex {
        /// Repository directory
        repo: PathBuf,

        /// Certification JSON path
        certification: PathBuf,

        /// Trusted certificates (base64); empty trusts any consistent
        /// certification
        #[arg(long)]
        trust: Vec<String>,
    },
}
