// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! End-to-end scheduling scenarios over real loopback sockets.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use spool_rt::{
    spawn, wait_all, wait_for_read, RuntimeError, Scheduler, TaskError, TaskId, TcpClient,
    TcpServer, Value,
};

#[test]
fn echo_round_trip_over_loopback() {
    let server = TcpServer::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    let mut sched = Scheduler::new();

    let server_task = sched.new_task(async move {
        let conn = server.accept().await?;
        let mut received = Vec::new();
        while received.len() < 8 {
            let piece = conn.read(8 - received.len()).await?;
            if piece.is_empty() {
                break;
            }
            received.extend_from_slice(&piece);
        }
        conn.write_all(&received).await?;
        conn.close();
        server.close();
        Ok(Value::Int(received.len() as i64))
    });

    let client_task = sched.new_task(async move {
        let conn = TcpClient::connect(addr)?;
        conn.write_all(b"12345678").await?;
        let echoed = conn.read_to_end(4).await?;
        conn.close();
        Ok(Value::Bytes(echoed))
    });

    sched.run().unwrap();

    assert_eq!(server_task.result().unwrap().unwrap().as_int(), Some(8));
    let echoed = client_task.result().unwrap().unwrap().into_bytes().unwrap();
    assert_eq!(echoed, b"12345678");
    assert!(!sched.is_waiting());
    assert_eq!(sched.task_count(), 0);
}

#[test]
fn readers_on_one_socket_are_released_in_registration_order() {
    let server = TcpServer::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    let server = Rc::new(server);
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut sched = Scheduler::new();

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let server = server.clone();
        let order = order.clone();
        let task = sched.new_task(async move {
            wait_for_read(&*server).await;
            Ok(Value::Unit)
        });
        let id = task.id();
        task.on_result(move |_| order.borrow_mut().push(id));
        waiters.push(id);
    }

    // Makes the listener readable once all three are parked.
    sched.new_task(async move {
        let conn = TcpClient::connect(addr)?;
        spool_rt::wait_for_write(&conn).await;
        Ok(Value::Unit)
    });

    sched.run().unwrap();
    assert_eq!(*order.borrow(), waiters);
    assert_eq!(waiters, vec![TaskId(1), TaskId(2), TaskId(3)]);
}

#[test]
fn join_over_n_tasks_yields_n_entries() {
    let mut sched = Scheduler::new();
    let parent = sched.new_task(async {
        let mut children = Vec::new();
        for n in 0..5i64 {
            children.push(spawn(async move { Ok(Value::Int(n * n)) }).await?);
        }
        let ids: Vec<_> = children.iter().map(|t| t.id()).collect();
        let joined = wait_all(children).await?;
        assert_eq!(joined.keys().copied().collect::<Vec<_>>(), ids);
        Ok(Value::Joined(joined))
    });

    sched.run().unwrap();
    let joined = parent.result().unwrap().unwrap().into_joined().unwrap();
    assert_eq!(joined.len(), 5);
    assert_eq!(joined[&TaskId(6)].as_ref().unwrap().as_int(), Some(16));
}

#[test]
fn empty_join_never_drains() {
    let mut sched = Scheduler::new();
    let joiner = sched.new_task(async {
        wait_all(Vec::new()).await?;
        Ok(Value::Unit)
    });
    let bystander = sched.new_task(async { Ok(Value::Unit) });

    let err = sched.run().unwrap_err();
    assert!(matches!(err, RuntimeError::EmptyJoin { .. }));
    assert!(!joiner.is_finished());
    assert!(matches!(
        joiner.result(),
        Err(RuntimeError::InvalidState { .. })
    ));
    // The run aborted before the rest of the queue got a turn.
    assert!(!bystander.is_finished());
    assert_eq!(sched.ready_len(), 1);
}

#[test]
fn refused_connection_stays_local_to_the_connecting_task() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let probe = TcpServer::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };
    let mut sched = Scheduler::new();

    let parent = sched.new_task(async move {
        let failing = spawn(async move {
            let conn = TcpClient::connect(addr)?;
            conn.write_all(b"GET / HTTP/1.1\r\n\r\n").await?;
            Ok(Value::Unit)
        })
        .await?;
        let fine = spawn(async { Ok(Value::Text("ok".into())) }).await?;
        let joined = wait_all(vec![failing, fine]).await?;
        Ok(Value::Joined(joined))
    });

    sched.run().unwrap();
    let joined = parent.result().unwrap().unwrap().into_joined().unwrap();
    assert_eq!(joined.len(), 2);

    let failure: &TaskError = joined[&TaskId(2)].as_ref().unwrap_err();
    assert_eq!(failure.io_kind(), Some(io::ErrorKind::ConnectionRefused));
    assert!(joined[&TaskId(3)].is_ok());
}
