//! Blocking TraCI client over TCP.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, instrument, trace};

use super::traci::{
    decode_get_response, decode_step_response, decode_version_response, encode_message,
    take_status, Command, TraciError, TraciResult, TraciValue, CMD_CLOSE,
};
use crate::domain::Position;

/// An open TraCI session with a simulation server.
#[derive(Debug)]
pub struct TraciConnection {
    stream: TcpStream,
}

impl TraciConnection {
    /// Connect to `addr`, retrying while the server is still starting up.
    #[instrument(level = "debug")]
    pub fn connect(addr: &str, retries: u32, delay: Duration) -> TraciResult<Self> {
        let mut attempt = 0;
        loop {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!("connected to TraCI server at {} after {} retries", addr, attempt);
                    return Ok(Self { stream });
                }
                Err(e) if attempt < retries => {
                    trace!("connect attempt {} to {} failed: {}", attempt + 1, addr, e);
                    attempt += 1;
                    thread::sleep(delay);
                }
                Err(e) => return Err(TraciError::Io(e)),
            }
        }
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }

    fn exchange(&mut self, command: Command) -> TraciResult<Bytes> {
        let message = encode_message(std::slice::from_ref(&command));
        trace!(command = command.id, len = message.len(), "send");
        self.stream.write_all(&message)?;
        self.stream.flush()?;

        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header)?;
        let total = u32::from_be_bytes(header) as usize;
        if total < 4 {
            return Err(TraciError::Truncated {
                needed: 4,
                available: total,
            });
        }
        let mut body = vec![0u8; total - 4];
        self.stream.read_exact(&mut body)?;
        trace!(command = command.id, len = total, "recv");
        Ok(Bytes::from(body))
    }

    /// API level and identifier string of the server.
    pub fn version(&mut self) -> TraciResult<(i32, String)> {
        let response = self.exchange(Command::get_version())?;
        decode_version_response(response)
    }

    /// Perform exactly one simulation step.
    pub fn simulation_step(&mut self) -> TraciResult<()> {
        let response = self.exchange(Command::simulation_step(0.0))?;
        decode_step_response(response).map(|_| ())
    }

    pub fn get(&mut self, domain: u8, variable: u8, object_id: &str) -> TraciResult<TraciValue> {
        let response = self.exchange(Command::get_variable(domain, variable, object_id))?;
        decode_get_response(response, domain, variable)
    }

    pub fn get_string(&mut self, domain: u8, variable: u8, object_id: &str) -> TraciResult<String> {
        self.get(domain, variable, object_id)?.into_string()
    }

    pub fn get_string_list(&mut self, domain: u8, variable: u8) -> TraciResult<Vec<String>> {
        self.get(domain, variable, "")?.into_string_list()
    }

    pub fn get_double(&mut self, domain: u8, variable: u8, object_id: &str) -> TraciResult<f64> {
        self.get(domain, variable, object_id)?.into_double()
    }

    pub fn get_position(
        &mut self,
        domain: u8,
        variable: u8,
        object_id: &str,
    ) -> TraciResult<Position> {
        self.get(domain, variable, object_id)?.into_position()
    }

    pub fn set_string(
        &mut self,
        domain: u8,
        variable: u8,
        object_id: &str,
        value: &str,
    ) -> TraciResult<()> {
        let command =
            Command::set_variable(domain, variable, object_id, &TraciValue::String(value.into()));
        let mut response = self.exchange(command)?;
        take_status(&mut response, domain).map(|_| ())
    }

    /// Ask the server to end the simulation. The connection is unusable afterwards.
    pub fn close(mut self) -> TraciResult<()> {
        let mut response = self.exchange(Command::close())?;
        take_status(&mut response, CMD_CLOSE).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::super::traci::*;
    use super::*;
    use std::net::TcpListener;

    fn read_message(stream: &mut TcpStream) -> Vec<u8> {
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize - 4];
        stream.read_exact(&mut body).unwrap();
        body
    }

    fn write_message(stream: &mut TcpStream, body: &[u8]) {
        stream
            .write_all(&((body.len() + 4) as u32).to_be_bytes())
            .unwrap();
        stream.write_all(body).unwrap();
    }

    fn ok_status(cmd: u8) -> Vec<u8> {
        vec![7, cmd, RTYPE_OK, 0, 0, 0, 0]
    }

    #[test]
    fn test_step_and_time_against_fake_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let step = read_message(&mut stream);
            assert_eq!(step[1], CMD_SIMSTEP);
            let mut reply = ok_status(CMD_SIMSTEP);
            reply.extend_from_slice(&0i32.to_be_bytes());
            write_message(&mut stream, &reply);

            let get = read_message(&mut stream);
            assert_eq!(get[1], CMD_GET_SIM_VARIABLE);
            assert_eq!(get[2], VAR_TIME);
            let mut reply = ok_status(CMD_GET_SIM_VARIABLE);
            let mut content = vec![VAR_TIME, 0, 0, 0, 0, TYPE_DOUBLE];
            content.extend_from_slice(&1.0f64.to_be_bytes());
            reply.push((2 + content.len()) as u8);
            reply.push(CMD_GET_SIM_VARIABLE + RESPONSE_OFFSET);
            reply.extend_from_slice(&content);
            write_message(&mut stream, &reply);

            let close = read_message(&mut stream);
            assert_eq!(close[1], CMD_CLOSE);
            write_message(&mut stream, &ok_status(CMD_CLOSE));
        });

        let mut conn = TraciConnection::connect(&addr, 0, Duration::from_millis(1)).unwrap();
        conn.simulation_step().unwrap();
        let time = conn.get_double(CMD_GET_SIM_VARIABLE, VAR_TIME, "").unwrap();
        assert_eq!(time, 1.0);
        conn.close().unwrap();

        server.join().unwrap();
    }

    #[test]
    fn test_connect_gives_up_after_retries() {
        // Bind then drop to obtain a port with no listener.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let result = TraciConnection::connect(&addr, 1, Duration::from_millis(1));
        assert!(matches!(result, Err(TraciError::Io(_))));
    }
}
