//! Typed configuration for the engine, loaded from environment variables
//! with fallback to compiled-in defaults ("env var if present, else a
//! compiled-in default") rather than a config-file parser.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use payhook_core::time::UnixTime;

/// The default processing lease: how long a claimed `event_id` stays
/// claimed before another delivery may take it over.
const DEFAULT_LEASE: Duration = Duration::from_secs(5 * 60);
/// The default signature timestamp tolerance.
const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::from_secs(300);
/// The default `limit` for a reconciliation pass.
const DEFAULT_RECONCILE_LIMIT: u32 = 100;
/// The default `created_after` window for a reconciliation pass: `now - 30
/// days`.
const DEFAULT_RECONCILE_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Which of the three mutable modules are active.
/// An event whose dispatch targets a disabled module is treated as a silent
/// no-op success, not an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModuleFlags {
    pub payments: bool,
    pub subscriptions: bool,
    pub refunds: bool,
}

impl Default for ModuleFlags {
    fn default() -> Self {
        Self {
            payments: true,
            subscriptions: true,
            refunds: true,
        }
    }
}

impl ModuleFlags {
    pub fn is_enabled(&self, module: Module) -> bool {
        match module {
            Module::Payments => self.payments,
            Module::Subscriptions => self.subscriptions,
            Module::Refunds => self.refunds,
        }
    }
}

/// The target kind a dispatched event mutates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Module {
    Payments,
    Subscriptions,
    Refunds,
}

/// Engine-wide configuration. `from_env` overlays `PAYHOOK_*`
/// environment variables on top of [`Default`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How long a `Processing` entry stays claimed before another delivery
    /// may take it over.
    pub lease_duration: Duration,
    /// The signature verifier's `|now - t|` tolerance.
    pub signature_tolerance: Duration,
    /// Default `limit` for a reconciliation pass when the caller doesn't
    /// specify one.
    pub reconcile_default_limit: u32,
    /// Default `created_after` window (as a duration before "now") for a
    /// reconciliation pass when the caller doesn't specify one.
    pub reconcile_default_window: Duration,
    /// Bind address for the reference HTTP server.
    pub bind_addr: SocketAddr,
    pub enabled_modules: ModuleFlags,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lease_duration: DEFAULT_LEASE,
            signature_tolerance: DEFAULT_SIGNATURE_TOLERANCE,
            reconcile_default_limit: DEFAULT_RECONCILE_LIMIT,
            reconcile_default_window: DEFAULT_RECONCILE_WINDOW,
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .expect("DEFAULT_BIND_ADDR must be a valid socket address"),
            enabled_modules: ModuleFlags::default(),
        }
    }
}

impl EngineConfig {
    /// Overlays `PAYHOOK_*` environment variables on top of [`Default`].
    /// Absent variables keep the default; a present-but-unparseable variable
    /// is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            lease_duration: env_duration_secs("PAYHOOK_LEASE_SECS", defaults.lease_duration)?,
            signature_tolerance: env_duration_secs(
                "PAYHOOK_SIGNATURE_TOLERANCE_SECS",
                defaults.signature_tolerance,
            )?,
            reconcile_default_limit: env_parsed(
                "PAYHOOK_RECONCILE_LIMIT",
                defaults.reconcile_default_limit,
            )?,
            reconcile_default_window: env_duration_secs(
                "PAYHOOK_RECONCILE_WINDOW_SECS",
                defaults.reconcile_default_window,
            )?,
            bind_addr: env_parsed("PAYHOOK_BIND_ADDR", defaults.bind_addr)?,
            enabled_modules: ModuleFlags {
                payments: env_parsed("PAYHOOK_ENABLE_PAYMENTS", defaults.enabled_modules.payments)?,
                subscriptions: env_parsed(
                    "PAYHOOK_ENABLE_SUBSCRIPTIONS",
                    defaults.enabled_modules.subscriptions,
                )?,
                refunds: env_parsed("PAYHOOK_ENABLE_REFUNDS", defaults.enabled_modules.refunds)?,
            },
        })
    }

    /// The `created_after` default for a reconciliation pass, anchored to
    /// `now`.
    pub fn reconcile_default_created_after(&self, now: UnixTime) -> UnixTime {
        now.checked_sub(self.reconcile_default_window)
            .unwrap_or(UnixTime::from_secs(0))
    }
}

fn env_parsed<T>(var: &'static str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for ${var}")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => {
            anyhow::bail!("${var} is not valid unicode")
        }
    }
}

fn env_duration_secs(var: &'static str, default: Duration) -> anyhow::Result<Duration> {
    let secs: u64 = env_parsed(var, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.lease_duration, Duration::from_secs(300));
        assert_eq!(config.signature_tolerance, Duration::from_secs(300));
        assert_eq!(config.reconcile_default_limit, 100);
        assert_eq!(config.reconcile_default_window, Duration::from_secs(30 * 86400));
        assert!(config.enabled_modules.payments);
        assert!(config.enabled_modules.subscriptions);
        assert!(config.enabled_modules.refunds);
    }

    #[test]
    fn reconcile_window_is_anchored_to_now() {
        let config = EngineConfig::default();
        let now = UnixTime::from_secs(40 * 86400);
        let created_after = config.reconcile_default_created_after(now);
        assert_eq!(created_after, UnixTime::from_secs(10 * 86400));
    }
}
