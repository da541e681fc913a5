//! Modbus adapter against a minimal in-test server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use ps_protocol::modbus::{ModbusConfig, ModbusTcpAdapter};
use ps_protocol::{AdapterError, ProtocolAdapter};

#[derive(Default)]
struct Registers {
    holding: Vec<u16>,
    coils: Vec<bool>,
}

/// Serve one client until it disconnects. Supports 0x01, 0x03, 0x06, 0x10.
fn spawn_server(regs: Arc<Mutex<Registers>>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        loop {
            let mut head = [0u8; 7];
            if stream.read_exact(&mut head).is_err() {
                break;
            }
            let len = u16::from_be_bytes([head[4], head[5]]) as usize - 1;
            let mut pdu = vec![0u8; len];
            if stream.read_exact(&mut pdu).is_err() {
                break;
            }
            let addr = u16::from_be_bytes([pdu[1], pdu[2]]) as usize;
            let mut regs = regs.lock().unwrap();
            let reply: Vec<u8> = match pdu[0] {
                0x01 => {
                    let qty = u16::from_be_bytes([pdu[3], pdu[4]]) as usize;
                    let mut bytes = vec![0u8; qty.div_ceil(8)];
                    for i in 0..qty {
                        if regs.coils[addr + i] {
                            bytes[i / 8] |= 1 << (i % 8);
                        }
                    }
                    let mut r = vec![0x01, bytes.len() as u8];
                    r.extend(bytes);
                    r
                }
                0x03 => {
                    let qty = u16::from_be_bytes([pdu[3], pdu[4]]) as usize;
                    let mut r = vec![0x03, (qty * 2) as u8];
                    for i in 0..qty {
                        r.extend_from_slice(&regs.holding[addr + i].to_be_bytes());
                    }
                    r
                }
                0x06 if addr >= regs.holding.len() => vec![0x86, 0x02],
                0x06 => {
                    regs.holding[addr] = u16::from_be_bytes([pdu[3], pdu[4]]);
                    pdu.clone()
                }
                0x10 => {
                    let qty = u16::from_be_bytes([pdu[3], pdu[4]]) as usize;
                    for i in 0..qty {
                        regs.holding[addr + i] =
                            u16::from_be_bytes([pdu[6 + 2 * i], pdu[7 + 2 * i]]);
                    }
                    pdu[..5].to_vec()
                }
                f => vec![f | 0x80, 0x01],
            };
            let mut frame = head.to_vec();
            frame[4..6].copy_from_slice(&((reply.len() + 1) as u16).to_be_bytes());
            frame.extend(reply);
            if stream.write_all(&frame).is_err() {
                break;
            }
        }
    });
    addr
}

fn registers() -> Arc<Mutex<Registers>> {
    Arc::new(Mutex::new(Registers {
        holding: vec![0; 128],
        coils: vec![false; 256],
    }))
}

#[test]
fn digital_inputs_modify_only_their_bit() {
    let regs = registers();
    regs.lock().unwrap().holding[0] = 0xAB00;
    let mut adapter = ModbusTcpAdapter::new(ModbusConfig::new(spawn_server(regs.clone())));
    adapter.connect().unwrap();

    adapter.set_digital_input(0, 3, true).unwrap();
    adapter.set_digital_input(0, 5, true).unwrap();
    adapter.set_digital_input(0, 3, false).unwrap();
    assert_eq!(regs.lock().unwrap().holding[0], 0xAB20);
}

#[test]
fn analog_and_coil_mapping() {
    let regs = registers();
    {
        let mut r = regs.lock().unwrap();
        r.holding[2 + 32] = 13824;
        r.holding[4 + 32] = 0xFFFF;
        r.coils[9] = true;
    }
    let mut adapter = ModbusTcpAdapter::new(ModbusConfig::new(spawn_server(regs.clone())));
    adapter.connect().unwrap();

    assert_eq!(adapter.get_analog_output(2).unwrap(), 13824);
    assert_eq!(adapter.get_analog_output(4).unwrap(), i16::MAX);
    assert!(adapter.get_digital_output(1, 1).unwrap());
    assert!(!adapter.get_digital_output(1, 0).unwrap());

    adapter.set_analog_input(6, 27648).unwrap();
    assert_eq!(regs.lock().unwrap().holding[6], 27648);

    adapter.reset_input_range(0, 10).unwrap();
    adapter.reset_output_range(0, 10).unwrap();
    let r = regs.lock().unwrap();
    assert_eq!(r.holding[6], 0);
    assert_eq!(r.holding[2 + 32], 0);
}

#[test]
fn server_exception_keeps_the_link() {
    let regs = registers();
    let mut adapter = ModbusTcpAdapter::new(ModbusConfig::new(spawn_server(regs)));
    adapter.connect().unwrap();
    let err = adapter.set_analog_input(200, 1).unwrap_err();
    assert!(matches!(err, AdapterError::Protocol(_)), "{err}");
    assert!(!err.is_connection_loss());
    assert!(adapter.is_connected());
    assert!(adapter.set_analog_input(2, 1).is_ok());
}

#[test]
fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let mut adapter = ModbusTcpAdapter::new(ModbusConfig::new(addr));
    assert!(matches!(adapter.connect(), Err(AdapterError::ConnectFailed(_))));
    assert!(!adapter.is_connected());
}
