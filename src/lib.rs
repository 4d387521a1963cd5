//! Profile-based mod manager engine for Thunderstore games.
//!
//! A [`profile::Profile`] declares which mods belong to a game setup. The engine
//! resolves dependencies against a [`index::PackageIndex`], installs archives
//! through the [`installer::Installer`] and converges the game's plugin directory
//! on the profile with [`reconcile::Reconciler`].

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod index;
pub mod installer;
pub mod logging;
pub mod orphans;
pub mod package;
pub mod profile;
pub mod progress;
pub mod reconcile;
pub mod resolver;
pub mod share;
pub mod store;
pub mod transfer;
pub mod transport;
