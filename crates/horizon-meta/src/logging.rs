//! Logging and debugging facilities for the meta-object runtime.
//!
//! # Tracing Integration
//!
//! The runtime logs through the `tracing` crate. Install a subscriber in your
//! application to see the output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_meta::dispatch=trace")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! [`RuntimeDebug`] renders the registered objects and their connections:
//!
//! ```ignore
//! use horizon_meta::logging::RuntimeDebug;
//!
//! println!("{}", RuntimeDebug::new(&runtime));
//! ```

use std::fmt;

use crate::runtime::Runtime;

/// Target names for log filtering.
pub mod targets {
    /// Class registration.
    pub const REGISTRY: &str = "horizon_meta::registry";
    /// Object lifecycle.
    pub const OBJECT: &str = "horizon_meta::object";
    /// Connect and disconnect.
    pub const CONNECTION: &str = "horizon_meta::connection";
    /// Signal emission and queued delivery.
    pub const DISPATCH: &str = "horizon_meta::dispatch";
    /// Event loops.
    pub const EVENT_LOOP: &str = "horizon_meta::event_loop";
}

/// Text dump of a runtime's objects and connections.
pub struct RuntimeDebug<'a> {
    runtime: &'a Runtime,
    show_connections: bool,
}

impl<'a> RuntimeDebug<'a> {
    pub fn new(runtime: &'a Runtime) -> Self {
        Self {
            runtime,
            show_connections: true,
        }
    }

    /// Omit the connection list.
    pub fn objects_only(mut self) -> Self {
        self.show_connections = false;
        self
    }

    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RuntimeDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows = self.runtime.object_rows();
        rows.sort_by_key(|(id, ..)| *id);

        writeln!(f, "objects ({}):", rows.len())?;
        for (id, class, name, outgoing, incoming) in &rows {
            let label = if name.is_empty() {
                String::new()
            } else {
                format!(" \"{name}\"")
            };
            writeln!(f, "  {class}{label} [{id:?}] out={outgoing} in={incoming}")?;
        }

        if self.show_connections {
            let mut connections = self.runtime.connections();
            connections.sort_by_key(|c| c.id);
            writeln!(f, "connections ({}):", connections.len())?;
            for info in connections {
                let signal = self
                    .runtime
                    .meta_object(info.sender)
                    .and_then(|meta| meta.method(info.signal_index).map(|m| m.signature().to_string()))
                    .unwrap_or_else(|| format!("#{}", info.signal_index));
                let slot = match (info.receiver, info.slot_index) {
                    (Some(receiver), Some(index)) => self
                        .runtime
                        .meta_object(receiver)
                        .and_then(|meta| meta.method(index).map(|m| m.signature().to_string()))
                        .map_or_else(|| format!("{receiver:?}#{index}"), |sig| format!("{receiver:?}.{sig}")),
                    _ => "<callback>".to_string(),
                };
                writeln!(
                    f,
                    "  {:?}.{signal} -> {slot} ({:?})",
                    info.sender, info.connection_type
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_runtime() {
        let runtime = Runtime::new();
        let text = RuntimeDebug::new(&runtime).to_string();
        assert!(text.contains("objects (0):"));
        assert!(text.contains("connections (0):"));
        let objects_only = RuntimeDebug::new(&runtime).objects_only().format();
        assert!(!objects_only.contains("connections"));
    }
}
