//! Full sessions against a scripted Telnet device over an in-memory pipe.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use rcmd::transport::{ConnectionMethod, InBandLogin, TelnetTransport};
use rcmd::{DeviceType, Error, SessionBuilder};

type Received = Arc<Mutex<Vec<String>>>;

/// Serve `greeting`, then answer each received line with `respond`. A lone
/// space (a pager keypress) is passed through as `" "`. `None` leaves the
/// input unanswered.
fn spawn_device<F>(
    stream: DuplexStream,
    greeting: &'static str,
    mut respond: F,
) -> (JoinHandle<()>, Received)
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    let received: Received = Arc::default();
    let log = received.clone();

    let handle = tokio::spawn(async move {
        let (mut read, mut write) = tokio::io::split(stream);
        let mut pending = Vec::new();
        let mut chunk = [0u8; 1024];

        if write.write_all(greeting.as_bytes()).await.is_err() {
            return;
        }
        loop {
            let n = match read.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            pending.extend_from_slice(&chunk[..n]);

            loop {
                let input = if let Some(end) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=end).collect();
                    String::from_utf8_lossy(&line)
                        .trim_end_matches(['\r', '\n'])
                        .to_string()
                } else if pending == b" " {
                    pending.clear();
                    " ".to_string()
                } else {
                    break;
                };

                let reply = respond(&input);
                log.lock().unwrap().push(input);
                if let Some(reply) = reply {
                    if write.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    (handle, received)
}

/// Cisco-style device: Telnet login, then a prompt that follows config mode.
fn ios_device() -> impl FnMut(&str) -> Option<String> + Send + 'static {
    let mut prompt = "core1#";
    let mut logged_in = false;
    move |line| {
        if !logged_in {
            return match line {
                "netops" => Some("netops\r\nPassword: ".to_string()),
                "secret" => {
                    logged_in = true;
                    Some(format!("\r\n\r\n{prompt}"))
                }
                _ => Some("\r\n% Login invalid\r\n\r\nUsername: ".to_string()),
            };
        }
        match line {
            "show version" => Some(format!(
                "show version\r\nCisco IOS Software, C3750E Software, Version 15.0(2)SE11\r\n{prompt}"
            )),
            "show tech-support" => None,
            "configure terminal" => {
                prompt = "core1(config)#";
                Some(format!(
                    "configure terminal\r\nEnter configuration commands, one per line.  End with CNTL/Z.\r\n{prompt}"
                ))
            }
            "exit" | "end" => {
                prompt = "core1#";
                Some(format!("{line}\r\n{prompt}"))
            }
            _ => Some(format!("{line}\r\n{prompt}")),
        }
    }
}

fn builder(device_type: DeviceType) -> SessionBuilder {
    SessionBuilder::new("core1", "192.0.2.10")
        .device_type(device_type)
        .method(ConnectionMethod::Telnet)
        .username("netops")
        .password("secret")
}

fn count(received: &Received, line: &str) -> usize {
    received.lock().unwrap().iter().filter(|l| *l == line).count()
}

#[tokio::test(start_paused = true)]
async fn test_script_end_to_end() {
    let (client, server) = tokio::io::duplex(4096);
    let (device, received) = spawn_device(server, "\r\nUser Access Verification\r\n\r\nUsername: ", ios_device());

    let mut session = builder(DeviceType::Ios)
        .connect_with(
            TelnetTransport::new(client, 511, 24),
            InBandLogin::UsernameAndPassword,
        )
        .await
        .unwrap();

    assert_eq!(session.prompt_text(), "core1#");
    let syncs_at_connect = count(&received, "");

    let script = [
        "# comment",
        "show version",
        "*",
        "configure terminal",
        "exit",
    ];
    let exchanges = session.execute_script(script, |_| Ok(())).await.unwrap();

    assert_eq!(exchanges.len(), 3);
    assert_eq!(exchanges[0].command, "show version");
    assert_eq!(
        exchanges[0].output,
        "Cisco IOS Software, C3750E Software, Version 15.0(2)SE11"
    );
    assert_eq!(
        exchanges[1].output,
        "Enter configuration commands, one per line.  End with CNTL/Z."
    );
    assert_eq!(count(&received, "") - syncs_at_connect, 1);

    session.disconnect().await;
    drop(session);
    device.await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(
        received[..],
        [
            "netops",
            "secret",
            "",
            "terminal length 0",
            "terminal width 511",
            "show version",
            "configure terminal",
            "",
            "exit",
            "exit",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_halts_processing() {
    let (client, server) = tokio::io::duplex(4096);
    let (device, received) = spawn_device(server, "Username: ", ios_device());

    let mut session = builder(DeviceType::Ios)
        .config(rcmd::SessionConfig::default().with_command_timeout(Duration::from_secs(5)))
        .connect_with(
            TelnetTransport::new(client, 511, 24),
            InBandLogin::UsernameAndPassword,
        )
        .await
        .unwrap();

    let mut transcript = Vec::new();
    let err = session
        .execute_script(
            ["show version", "show tech-support", "show users"],
            |exchange| {
                transcript.push(exchange.command.clone());
                Ok(())
            },
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::CommandTimeout { ref command, .. } if command == "show tech-support"),
        "{err}"
    );
    assert_eq!(transcript, ["show version"]);

    drop(session);
    device.await.unwrap();
    assert_eq!(count(&received, "show users"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_detects_asa_and_elevates() {
    let (client, server) = tokio::io::duplex(4096);
    let mut prompt = "edge-fw1>";
    let (device, received) = spawn_device(server, "\r\nedge-fw1>", move |line| match line {
        "show version" => Some(
            "show version\r\n\r\nCisco Adaptive Security Appliance Software Version 9.8(2)\r\n\
             Compiled on Fri 02-Jun-17 08:43 PDT by builders\r\n\
             <--- More --->"
                .to_string(),
        ),
        " " => Some(format!(
            "\r\nHardware:   ASA5525, 8192 MB RAM, CPU Lynnfield 2393 MHz, 1 CPU (4 cores)\r\n\r\n{prompt}"
        )),
        "enable" => Some("enable\r\nPassword: ".to_string()),
        "fw-enable" => {
            prompt = "edge-fw1#";
            Some(format!("\r\n{prompt}"))
        }
        _ => Some(format!("{line}\r\n{prompt}")),
    });

    let mut session = SessionBuilder::new("edge-fw1", "192.0.2.254")
        .method(ConnectionMethod::Telnet)
        .username("netops")
        .password("secret")
        .enable_password("fw-enable")
        .connect_with(TelnetTransport::new(client, 511, 24), InBandLogin::None)
        .await
        .unwrap();

    assert_eq!(session.device_type(), DeviceType::Asa);
    assert_eq!(session.detected_hostname(), Some("edge-fw1"));

    let exchange = session.send_command("show failover").await.unwrap();
    assert_eq!(exchange.command, "show failover");

    session.disconnect().await;
    drop(session);
    device.await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(
        received[..],
        [
            "",
            "terminal length 0",
            "show version",
            " ",
            "enable",
            "fw-enable",
            "terminal pager 0",
            "show failover",
            "exit",
        ]
    );
}
