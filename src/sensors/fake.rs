//! In-memory I2C bus for driver tests.

use std::collections::HashMap;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct FakeState {
    /// Byte registers with auto-increment reads (BME280 style).
    pub registers: HashMap<(u8, u8), u8>,
    /// 16-bit little endian command registers (VCNL4040 style).
    pub words: HashMap<(u8, u8), [u8; 2]>,
    /// Canned responses to 16-bit commands (Sensirion style).
    pub responses: HashMap<(u8, u16), Vec<u8>>,
    /// Every write, in order.
    pub writes: Vec<(u8, Vec<u8>)>,
    pub present: Vec<u8>,
    pub fail_reads: bool,
    pointer: HashMap<u8, u8>,
    last_command: HashMap<u8, u16>,
}

/// Cloneable handle; clones share state so tests can inspect and mutate it.
#[derive(Debug, Clone, Default)]
pub struct FakeBus(pub Arc<Mutex<FakeState>>);

impl FakeBus {
    pub fn with_device(address: u8) -> Self {
        let bus = Self::default();
        bus.0.lock().present.push(address);
        bus
    }

    pub fn set_register(&self, address: u8, reg: u8, value: u8) {
        self.0.lock().registers.insert((address, reg), value);
    }

    pub fn set_registers(&self, address: u8, start: u8, values: &[u8]) {
        let mut state = self.0.lock();
        for (i, v) in values.iter().enumerate() {
            state.registers.insert((address, start + i as u8), *v);
        }
    }

    pub fn set_word(&self, address: u8, command: u8, value: u16) {
        self.0.lock().words.insert((address, command), value.to_le_bytes());
    }

    pub fn word(&self, address: u8, command: u8) -> Option<u16> {
        self.0.lock().words.get(&(address, command)).map(|b| u16::from_le_bytes(*b))
    }

    pub fn respond(&self, address: u8, command: u16, bytes: Vec<u8>) {
        self.0.lock().responses.insert((address, command), bytes);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.0.lock().fail_reads = fail;
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.0.lock().writes.clone()
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.0.lock();
        if !state.present.contains(&address) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    state.writes.push((address, bytes.to_vec()));
                    match bytes.len() {
                        0 => {}
                        1 => {
                            state.pointer.insert(address, bytes[0]);
                            state.last_command.remove(&address);
                        }
                        _ => {
                            let reg = bytes[0];
                            state.pointer.insert(address, reg);
                            let command = u16::from_be_bytes([bytes[0], bytes[1]]);
                            state.last_command.insert(address, command);
                            if bytes.len() == 2 {
                                state.registers.insert((address, reg), bytes[1]);
                            }
                            if bytes.len() == 3 {
                                state.words.insert((address, reg), [bytes[1], bytes[2]]);
                            }
                        }
                    }
                }
                Operation::Read(buf) => {
                    if state.fail_reads {
                        return Err(ErrorKind::Other);
                    }
                    let command = state.last_command.get(&address).copied();
                    let pointer = state.pointer.get(&address).copied().unwrap_or(0);
                    if let Some(response) = command.and_then(|c| state.responses.get(&(address, c))) {
                        let n = buf.len().min(response.len());
                        buf[..n].copy_from_slice(&response[..n]);
                    } else if let Some(word) = state.words.get(&(address, pointer)) {
                        let n = buf.len().min(2);
                        buf[..n].copy_from_slice(&word[..n]);
                    } else {
                        for (i, b) in buf.iter_mut().enumerate() {
                            let reg = pointer.wrapping_add(i as u8);
                            *b = state.registers.get(&(address, reg)).copied().unwrap_or(0);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
