use crate::domain::{
    config::{Parity, PortConfig},
    error::{PortLabError, PortLabResult},
};
use crate::infrastructure::serial::backend::{SerialBackend, SerialHandle};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Backend over the real OS serial subsystem via the serialport crate.
#[derive(Debug, Clone, Default)]
pub struct SystemBackend;

impl SystemBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SerialBackend for SystemBackend {
    fn port_names(&self) -> PortLabResult<Vec<String>> {
        let ports = serialport::available_ports()?;
        debug!("OS reports {} serial ports", ports.len());
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, name: &str, config: &PortConfig) -> PortLabResult<Box<dyn SerialHandle>> {
        let builder = serialport::new(name, config.baud_rate)
            .data_bits(map_data_bits(config.data_bits)?)
            .parity(map_parity(config.parity)?)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(100));

        let mut port = builder.open()?;
        // The builder carries no line states; apply them on the open port.
        port.write_data_terminal_ready(config.dtr)?;
        port.write_request_to_send(config.rts)?;

        info!("Opened serial port {}", name);
        Ok(Box::new(SystemHandle { port }))
    }
}

struct SystemHandle {
    port: Box<dyn SerialPort>,
}

impl SerialHandle for SystemHandle {
    fn write_bytes(&mut self, data: &[u8]) -> PortLabResult<()> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn bytes_to_read(&mut self) -> PortLabResult<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_buffered(&mut self, buf: &mut [u8]) -> PortLabResult<usize> {
        Ok(self.port.read(buf)?)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> PortLabResult<()> {
        self.port.set_baud_rate(baud_rate)?;
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> PortLabResult<()> {
        self.port.set_parity(map_parity(parity)?)?;
        Ok(())
    }

    fn set_data_bits(&mut self, data_bits: u8) -> PortLabResult<()> {
        self.port.set_data_bits(map_data_bits(data_bits)?)?;
        Ok(())
    }

    fn set_dtr(&mut self, enabled: bool) -> PortLabResult<()> {
        self.port.write_data_terminal_ready(enabled)?;
        Ok(())
    }

    fn set_rts(&mut self, enabled: bool) -> PortLabResult<()> {
        self.port.write_request_to_send(enabled)?;
        Ok(())
    }

    fn shutdown(&mut self) -> PortLabResult<()> {
        // The crate releases the port on drop; nothing can fail ahead of it.
        Ok(())
    }
}

fn map_data_bits(data_bits: u8) -> PortLabResult<serialport::DataBits> {
    match data_bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        _ => Err(PortLabError::Config {
            message: format!("Invalid data bits: {}", data_bits),
        }),
    }
}

fn map_parity(parity: Parity) -> PortLabResult<serialport::Parity> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Odd => Ok(serialport::Parity::Odd),
        // The serialport crate has no mark/space support
        Parity::Mark | Parity::Space => Err(PortLabError::Config {
            message: format!("Unsupported parity: {}", parity),
        }),
    }
}
