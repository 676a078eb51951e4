//! CPU profile
//!
//! A tracing layer that times every span the host enters (scripts, load
//! callbacks, frame callbacks, composition) and writes a per-span
//! summary when the player exits.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use tracing::Subscriber;
use tracing::span::Id;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpanStats {
    pub calls: u64,
    pub total: Duration,
    pub max: Duration,
}

impl SpanStats {
    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }
}

type Table = Arc<Mutex<BTreeMap<&'static str, SpanStats>>>;

/// Span timing layer
pub struct ProfileLayer {
    stats: Table,
}

/// Read side of a [`ProfileLayer`]
#[derive(Clone)]
pub struct Profile {
    stats: Table,
}

struct Entered(Instant);

impl ProfileLayer {
    pub fn new() -> (Self, Profile) {
        let stats = Table::default();
        (
            Self {
                stats: stats.clone(),
            },
            Profile { stats },
        )
    }
}

impl<S> Layer<S> for ProfileLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(Entered(Instant::now()));
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let Some(Entered(start)) = span.extensions_mut().remove::<Entered>() else {
            return;
        };
        if let Ok(mut stats) = self.stats.lock() {
            stats.entry(span.name()).or_default().record(start.elapsed());
        }
    }
}

impl Profile {
    pub fn stats(&self) -> BTreeMap<&'static str, SpanStats> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// One line per span, slowest total first
    pub fn report(&self) -> String {
        let mut rows: Vec<_> = self.stats().into_iter().collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total));

        let mut out = format!("{:<24} {:>10} {:>14} {:>12}\n", "span", "calls", "total ms", "max ms");
        for (name, stats) in rows {
            let _ = writeln!(
                out,
                "{:<24} {:>10} {:>14.3} {:>12.3}",
                name,
                stats.calls,
                stats.total.as_secs_f64() * 1000.0,
                stats.max.as_secs_f64() * 1000.0
            );
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.report())
            .with_context(|| format!("cannot write profile {}", path.display()))?;
        tracing::info!(path = %path.display(), "profile written");
        Ok(())
    }
}
