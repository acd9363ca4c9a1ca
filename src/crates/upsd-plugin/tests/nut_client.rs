use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use upsd_plugin::{DataSource, NutClient, UpsdError};

const TIMEOUT: Duration = Duration::from_millis(300);

/// A scripted upsd: every request line is answered with `reply(line)`, or
/// left unanswered when it returns `None`.
struct FakeUpsd {
    address: String,
    connections: Arc<AtomicUsize>,
}

impl FakeUpsd {
    async fn start(reply: fn(&str) -> Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let (read, mut write) = stream.into_split();
                    let mut lines = BufReader::new(read).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if let Some(answer) = reply(&line) {
                            if write.write_all(answer.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        Self {
            address,
            connections,
        }
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn rack_upsd(line: &str) -> Option<String> {
    let answer = match line {
        "LIST UPS" => concat!(
            "BEGIN LIST UPS\n",
            "UPS ups1 \"Main rack\"\n",
            "UPS \"rack 2\" \"Spare\"\n",
            "END LIST UPS\n",
        ),
        "LIST VAR ups1" => concat!(
            "BEGIN LIST VAR ups1\n",
            "VAR ups1 battery.charge \"100\"\n",
            "VAR ups1 device.model \"Back-UPS \\\"XS\\\" 700\"\n",
            "VAR ups1 ups.status \"OL CHRG\"\n",
            "END LIST VAR ups1\n",
        ),
        "GET VAR ups1 battery.charge" => "VAR ups1 battery.charge \"97\"\n",
        "GET VAR \"rack 2\" ups.load" => "VAR \"rack 2\" ups.load \"12\"\n",
        "GET VAR ups1 ups.realpower" => "ERR VAR-NOT-SUPPORTED\n",
        "GET VAR ups1 ups.load" => "ERR DATA-STALE\n",
        "GET VAR ups1 weird" => "OK\n",
        "GET VAR ups1 ups.temperature" => return None,
        "LIST VAR broken" => "VAR broken ups.status \"OL\"\n",
        "LOGOUT" => "OK Goodbye\n",
        _ => "ERR UNKNOWN-COMMAND\n",
    };
    Some(answer.to_string())
}

fn words(row: &[String]) -> Vec<&str> {
    row.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn test_list_devices_includes_end_marker() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    let rows = client.list_devices().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(words(&rows[0]), vec!["UPS", "ups1", "Main rack"]);
    assert_eq!(words(&rows[1]), vec!["UPS", "rack 2", "Spare"]);
    assert_eq!(words(&rows[2]), vec!["END", "LIST", "UPS"]);
}

#[tokio::test]
async fn test_list_variables_unquotes_values() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    let rows = client.list_variables("ups1").await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(
        words(&rows[1]),
        vec!["VAR", "ups1", "device.model", "Back-UPS \"XS\" 700"]
    );
    assert_eq!(words(&rows[2]), vec!["VAR", "ups1", "ups.status", "OL CHRG"]);
    assert_eq!(rows[3][0], "END");
}

#[tokio::test]
async fn test_get_variable() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    assert_eq!(
        client.get_variable("ups1", "battery.charge").await.unwrap(),
        "97"
    );
    // device names with spaces are quoted on the wire
    assert_eq!(client.get_variable("rack 2", "ups.load").await.unwrap(), "12");
    assert_eq!(upsd.connections(), 1);
}

#[tokio::test]
async fn test_unsupported_variable() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    let err = client
        .get_variable("ups1", "ups.realpower")
        .await
        .unwrap_err();
    assert!(
        matches!(&err, UpsdError::NotSupported { device, variable } if device == "ups1" && variable == "ups.realpower"),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_daemon_error_keeps_connection() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    let err = client.get_variable("ups1", "ups.load").await.unwrap_err();
    assert!(
        matches!(&err, UpsdError::Daemon { code } if code == "DATA-STALE"),
        "{err:?}"
    );

    assert_eq!(
        client.get_variable("ups1", "battery.charge").await.unwrap(),
        "97"
    );
    assert_eq!(upsd.connections(), 1);
}

#[tokio::test]
async fn test_timeout_reconnects_on_next_request() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    let err = client
        .get_variable("ups1", "ups.temperature")
        .await
        .unwrap_err();
    assert!(matches!(err, UpsdError::Timeout { .. }), "{err:?}");
    assert!(err.to_string().contains("GET VAR ups1 ups.temperature"));

    assert_eq!(
        client.get_variable("ups1", "battery.charge").await.unwrap(),
        "97"
    );
    assert_eq!(upsd.connections(), 2);
}

#[tokio::test]
async fn test_unexpected_replies_are_protocol_errors() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    let err = client.get_variable("ups1", "weird").await.unwrap_err();
    assert!(matches!(err, UpsdError::Protocol { .. }), "{err:?}");

    let err = client.list_variables("broken").await.unwrap_err();
    assert!(matches!(err, UpsdError::Protocol { .. }), "{err:?}");

    // the client recovers with a fresh connection
    assert_eq!(client.list_devices().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = NutClient::connect(&address, TIMEOUT).await.err().unwrap();
    assert!(
        matches!(&err, UpsdError::Connect { address: a, .. } if *a == address),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_close_logs_out() {
    let upsd = FakeUpsd::start(rack_upsd).await;
    let mut client = NutClient::connect(&upsd.address, TIMEOUT).await.unwrap();

    client.close().await;
    // closing twice is a no-op
    client.close().await;
    assert_eq!(upsd.connections(), 1);
}
