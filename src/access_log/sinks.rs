//! Stock access log sinks.

use std::io::Write;
use std::sync::Mutex;

use tracing::info;

use super::{AccessSink, LoggedExchange, SinkError};

/// Emits one `tracing` event per exchange under the `access` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AccessSink for TracingSink {
    fn log(&self, exchange: &LoggedExchange) -> Result<(), SinkError> {
        info!(
            target: "access",
            remote_ip = %exchange.remote_ip,
            remote_port = exchange.remote_port,
            tls = exchange.tls,
            port = exchange.port,
            is_large = exchange.is_large,
            request = %exchange.request,
            response = %exchange.response,
            "exchange"
        );
        Ok(())
    }
}

/// Writes each exchange as one JSON object per line.
///
/// The writer is behind a mutex so the sink can be shared by several runners.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the writer, e.g. to inspect an in-memory buffer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> AccessSink for JsonLinesSink<W> {
    fn log(&self, exchange: &LoggedExchange) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(exchange)?;
        line.push(b'\n');
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Other("writer lock poisoned".into()))?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv6Addr};

    fn exchange() -> LoggedExchange {
        LoggedExchange {
            remote_ip: IpAddr::V6(Ipv6Addr::LOCALHOST),
            remote_port: 40000,
            tls: true,
            port: 8443,
            request: "GET / HTTP/1.1\n\n".into(),
            response: "hello".into(),
            is_large: false,
        }
    }

    #[test]
    fn json_lines_one_object_per_exchange() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.log(&exchange()).unwrap();
        sink.log(&exchange()).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["remote_ip"], "::1");
        assert_eq!(value["port"], 8443);
        assert_eq!(value["tls"], true);
        assert_eq!(value["response"], "hello");
    }

    #[test]
    fn tracing_sink_never_fails() {
        assert!(TracingSink.log(&exchange()).is_ok());
    }
}
