use futures::SinkExt;
use matching_engine::protocol::{InputCodec, InputRecord};
use matching_engine::Order;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use tokio::net::UnixStream;
use tokio_util::codec::FramedWrite;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One replayable line of an order script
#[derive(Debug)]
struct ScriptCommand {
    client: u32,
    order: Order,
}

/// Parse `<client> B|S <id> <instrument> <price> <count>` and `<client> C <id>`
///
/// Returns `Ok(None)` for comments, blank lines and the harness control lines
/// (`.`, `o`, `x`, a bare client count), which this client has no use for.
fn parse_line(line: &str) -> Result<Option<ScriptCommand>, Box<dyn Error>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Ok(None);
    }

    let client: u32 = fields[0].parse()?;
    let order = match (fields[1], fields.len()) {
        ("B", 6) => Order::buy(fields[2].parse()?, fields[3], fields[4].parse()?, fields[5].parse()?),
        ("S", 6) => Order::sell(fields[2].parse()?, fields[3], fields[4].parse()?, fields[5].parse()?),
        ("C", 3) => Order::cancel(fields[2].parse()?),
        _ => return Err(format!("Unrecognized script line: {}", line).into()),
    };

    Ok(Some(ScriptCommand { client, order }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args_os().skip(1);
    let (Some(socket_path), Some(script_path)) = (args.next(), args.next()) else {
        return Err("usage: order_client <socket path> <script>".into());
    };
    let socket_path = PathBuf::from(socket_path);

    let script = tokio::fs::read_to_string(&script_path).await?;
    let mut commands = Vec::new();
    for (number, line) in script.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(command)) => commands.push(command),
            Ok(None) => {}
            Err(e) => return Err(format!("line {}: {}", number + 1, e).into()),
        }
    }

    tracing::info!("📤 Replaying {} commands against {}", commands.len(), socket_path.display());

    // One connection per client id, opened on first use
    let mut connections: HashMap<u32, FramedWrite<UnixStream, InputCodec>> = HashMap::new();

    for command in &commands {
        if !connections.contains_key(&command.client) {
            let stream = UnixStream::connect(&socket_path).await?;
            tracing::debug!(client = command.client, "Connected");
            connections.insert(command.client, FramedWrite::new(stream, InputCodec::new()));
        }
        let Some(framed) = connections.get_mut(&command.client) else {
            continue;
        };

        framed.send(InputRecord::from_order(&command.order)).await?;
    }

    for (client, mut framed) in connections {
        framed.close().await?;
        tracing::debug!(client, "Disconnected");
    }

    tracing::info!("📤 Replay complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_engine::OrderSide;

    #[test]
    fn test_parse_orders() {
        let buy = parse_line("0 B 1 GOOG 100 10").unwrap().unwrap();
        assert_eq!(buy.client, 0);
        assert_eq!(buy.order.side, OrderSide::Buy);
        assert_eq!(buy.order.instrument, "GOOG");
        assert_eq!(buy.order.price, 100);
        assert_eq!(buy.order.remaining_count, 10);

        let cancel = parse_line("3 C 1").unwrap().unwrap();
        assert_eq!(cancel.client, 3);
        assert!(cancel.order.is_cancel());
    }

    #[test]
    fn test_control_lines_ignored() {
        for line in ["# seed: 42", "", "4", ".", "o", "x"] {
            assert!(parse_line(line).unwrap().is_none(), "line {:?}", line);
        }
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_line("0 B 1 GOOG 100").is_err());
        assert!(parse_line("0 Q 1").is_err());
        assert!(parse_line("zero C 1").is_err());
    }
}
