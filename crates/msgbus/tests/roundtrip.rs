#![cfg(feature = "rpc")]

use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use msgbus::frame::{FrameReader, FrameWriter, Message, MessagePtr, Payload};
use msgbus::rpc::{connect, BusListener, Dispatcher, RpcError};

#[test]
fn frames_written_back_to_back_read_in_order() {
    let mut wire = Vec::new();
    {
        let mut writer = FrameWriter::new(&mut wire);
        for id in 1..=3 {
            let mut msg = Message::with_id(id);
            msg.set_method("seq");
            msg.set("n", id.to_string());
            writer.write_message(&msg).unwrap();
        }
    }

    let mut reader = FrameReader::new(Cursor::new(wire));
    for id in 1..=3 {
        let msg = reader.read_message().unwrap();
        assert_eq!(msg.id(), id);
        assert_eq!(msg.get("n"), Some(id.to_string().as_str()));
    }
}

#[test]
fn calls_over_tcp_interleave_across_threads() {
    let dispatcher: Dispatcher = Arc::new(|request: MessagePtr| {
        let mut out = Payload::new();
        let n: u64 = request.get("n").and_then(|n| n.parse().ok()).unwrap_or(0);
        out.insert("double".to_string(), (n * 2).to_string());
        Some(out)
    });
    let listener = BusListener::bind("127.0.0.1:0")
        .expect("listener should bind")
        .with_dispatcher(dispatcher);
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let mut conn = listener.accept().expect("listener should accept");
        conn.wait();
    });

    {
        let client = Arc::new(connect(addr).expect("client should connect"));
        let workers: Vec<_> = (0..4u64)
            .map(|t| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for i in 0..25u64 {
                        let n = t * 100 + i;
                        let mut input = Payload::new();
                        input.insert("n".to_string(), n.to_string());
                        let out = client.call("double", input).unwrap();
                        assert_eq!(out.get("double"), Some(&(n * 2).to_string()));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(matches!(
            client.call("", Payload::new()),
            Err(RpcError::InvalidArgument(_))
        ));
    }

    server.join().expect("server thread should finish");
}
