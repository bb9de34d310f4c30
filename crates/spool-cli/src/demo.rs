// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Demo tasks riding on the runtime.
//!
//! A toy HTTP-ish server that answers every request by echoing it, a
//! client that fires a batch of requests and joins them, and an 8-byte
//! echo pair used by `spool echo`.

use std::net::SocketAddr;

use spool_rt::{spawn, wait_all, AsSocketId, TaskResult, TcpClient, TcpServer, Value};

/// Bytes of each response `request` keeps.
pub const RESPONSE_PREVIEW: usize = 64;

pub const ECHO_PAYLOAD: &[u8; 8] = b"spool-rt";

/// Accept loop. Every client gets its own handler task.
///
/// Stops after `max_clients` connections if given, otherwise runs forever.
pub async fn server(listener: TcpServer, read_chunk: usize, max_clients: Option<usize>) -> TaskResult {
    log::info!("server listening on {}", listener.local_addr()?);

    let mut accepted = 0usize;
    while max_clients.map_or(true, |max| accepted < max) {
        let client = listener.accept().await?;
        log::info!("accept socket {}", client.socket_id());
        spawn(handle_client(client, read_chunk)).await?;
        accepted += 1;
    }

    listener.close();
    Ok(Value::Int(accepted as i64))
}

pub async fn handle_client(client: TcpClient, read_chunk: usize) -> TaskResult {
    let data = client.read(read_chunk).await?;
    log::info!("read {} bytes from {}", data.len(), client.socket_id());

    client.write_all(http_response(&data).as_bytes()).await?;
    log::info!("write to socket {}", client.socket_id());

    client.close();
    Ok(Value::Int(data.len() as i64))
}

pub fn http_response(request: &[u8]) -> String {
    let body = format!(
        "Received following request:\n\n{}",
        String::from_utf8_lossy(request)
    );
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    )
}

pub fn request_text(addr: SocketAddr) -> String {
    format!(
        "GET / HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: close\r\n\
         Accept: text/plain\r\n\
         User-Agent: spool/{}\r\n\
         \r\n",
        addr,
        env!("CARGO_PKG_VERSION")
    )
}

/// Spawn `count` requests and join them. Resolves to the joined results.
pub async fn requests(addr: SocketAddr, count: usize) -> TaskResult {
    let mut tasks = Vec::with_capacity(count);
    for _ in 0..count {
        tasks.push(spawn(request(addr)).await?);
    }
    let joined = wait_all(tasks).await?;
    Ok(Value::Joined(joined))
}

/// One request: write a GET, keep the first bytes of the answer.
pub async fn request(addr: SocketAddr) -> TaskResult {
    let conn = TcpClient::connect(addr)?;
    log::info!("start request on {}", conn.socket_id());

    conn.write_all(request_text(addr).as_bytes()).await?;
    let response = conn.read(RESPONSE_PREVIEW).await?;

    conn.close();
    Ok(Value::Bytes(response))
}

/// Accept one client, echo back `expected` bytes, close.
pub async fn echo_server(listener: TcpServer, expected: usize) -> TaskResult {
    let conn = listener.accept().await?;
    listener.close();

    let mut received = Vec::with_capacity(expected);
    while received.len() < expected {
        let piece = conn.read(expected - received.len()).await?;
        if piece.is_empty() {
            break;
        }
        received.extend_from_slice(&piece);
    }
    conn.write_all(&received).await?;
    conn.close();
    Ok(Value::Int(received.len() as i64))
}

/// Write `payload`, then read until the server closes.
pub async fn echo_client(addr: SocketAddr, payload: Vec<u8>) -> TaskResult {
    let conn = TcpClient::connect(addr)?;
    conn.write_all(&payload).await?;
    let echoed = conn.read_to_end(payload.len().max(1)).await?;
    conn.close();
    Ok(Value::Bytes(echoed))
}
