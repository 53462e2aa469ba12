//! On-board data processor: filters attached to a data source.
//!
//! `ADD` answers in two shapes. A plain notification carries the id of the
//! filter just created; a read response (bit 7 of byte 1 set) carries the
//! filter's stored configuration.

use serde::Serialize;

use super::{module_id, CommandSink, INFO};
use crate::error::{DecodeError, Result};
use crate::protocol::catalog::{Arity, ModuleSpec, RegisterSpec};
use crate::protocol::dispatcher::{DispatchContext, Listener};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::{
    is_read_response, pack_offset_len, require, unpack_offset_len, SourceDescriptor, PAYLOAD_OFFSET,
};

pub const ADD: u8 = 0x02;
pub const NOTIFY: u8 = 0x03;
pub const REMOVE: u8 = 0x06;
pub const NOTIFY_ENABLE: u8 = 0x07;

pub const MODULE: ModuleSpec = ModuleSpec {
    id: module_id::DATA_PROCESSOR,
    name: "dataproc",
    registers: &[
        INFO,
        RegisterSpec::new(ADD, "ADD")
            .read(Arity::Exact(1))
            .decode(decode_add),
        RegisterSpec::new(NOTIFY, "NOTIFY")
            .write(Arity::Unsupported)
            .decode(decode_notify),
        RegisterSpec::new(REMOVE, "REMOVE").write(Arity::Exact(1)),
        RegisterSpec::new(NOTIFY_ENABLE, "NOTIFY_ENABLE").write(Arity::Exact(2)),
    ],
};

/// Bytes `offset .. offset + length` of a data source's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataSource {
    pub descriptor: SourceDescriptor,
    pub offset: u8,
    pub length: u8,
}

impl DataSource {
    pub fn to_bytes(self) -> [u8; 4] {
        let [m, r, i] = self.descriptor.to_bytes();
        [m, r, i, pack_offset_len(self.offset, self.length)]
    }

    pub fn from_bytes(data: &[u8], offset: usize) -> Result<Self, DecodeError> {
        require(data, offset + 4)?;
        let descriptor = SourceDescriptor::from_bytes(data, offset)?;
        let (off, len) = unpack_offset_len(data[offset + 3]);
        Ok(Self {
            descriptor,
            offset: off,
            length: len,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DataProcessorEvent {
    FilterCreated { id: u8 },
    FilterConfig { source: DataSource, config: Vec<u8> },
    Output { id: u8, data: Vec<u8> },
}

fn decode_add(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    let event = if is_read_response(data) {
        let source = DataSource::from_bytes(data, PAYLOAD_OFFSET)?;
        DataProcessorEvent::FilterConfig {
            source,
            config: data[PAYLOAD_OFFSET + 4..].to_vec(),
        }
    } else {
        require(data, 3)?;
        DataProcessorEvent::FilterCreated { id: data[2] }
    };
    Ok(Some(ModuleEvent::DataProcessor(event)))
}

fn decode_notify(data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    require(data, 3)?;
    Ok(Some(ModuleEvent::DataProcessor(DataProcessorEvent::Output {
        id: data[2],
        data: data[3..].to_vec(),
    })))
}

/// Data processor controller.
pub struct DataProcessor<'a, S: ?Sized> {
    sink: &'a mut S,
}

impl<'a, S: CommandSink + ?Sized> DataProcessor<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self { sink }
    }

    /// Attach a filter to `source`. `config` is the filter's own
    /// configuration block, starting with its type byte. The new filter id
    /// arrives as [`DataProcessorEvent::FilterCreated`].
    pub fn add_filter(&mut self, source: DataSource, config: &[u8]) -> Result<()> {
        let mut params = source.to_bytes().to_vec();
        params.extend_from_slice(config);
        self.sink.write_register(module_id::DATA_PROCESSOR, ADD, &params)
    }

    pub fn read_filter(&mut self, id: u8) -> Result<()> {
        self.sink.read_register(module_id::DATA_PROCESSOR, ADD, &[id])
    }

    pub fn remove_filter(&mut self, id: u8) -> Result<()> {
        self.sink.write_register(module_id::DATA_PROCESSOR, REMOVE, &[id])
    }

    pub fn enable_notifications(&mut self, id: u8, enable: bool) -> Result<()> {
        self.sink.write_register(module_id::DATA_PROCESSOR, NOTIFY_ENABLE, &[id, enable as u8])
    }
}

pub trait DataProcessorListener: Send {
    fn received_filter_id(&mut self, _id: u8, _ctx: &mut DispatchContext<'_>) {}
    fn received_filter_config(
        &mut self,
        _source: DataSource,
        _config: &[u8],
        _ctx: &mut DispatchContext<'_>,
    ) {
    }
    fn received_filter_output(&mut self, _id: u8, _data: &[u8], _ctx: &mut DispatchContext<'_>) {}
}

pub struct DataProcessorAdapter<L>(pub L);

impl<L: DataProcessorListener> Listener for DataProcessorAdapter<L> {
    fn on_event(&mut self, event: &ModuleEvent, ctx: &mut DispatchContext<'_>) {
        let ModuleEvent::DataProcessor(event) = event else {
            return;
        };
        match event {
            DataProcessorEvent::FilterCreated { id } => self.0.received_filter_id(*id, ctx),
            DataProcessorEvent::FilterConfig { source, config } => {
                self.0.received_filter_config(*source, config, ctx)
            }
            DataProcessorEvent::Output { id, data } => {
                self.0.received_filter_output(*id, data, ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::accelerometer;
    use crate::modules::test_support::{decode, Sink};
    use crate::modules::ModuleControllers;

    fn accel_z() -> DataSource {
        DataSource {
            descriptor: SourceDescriptor::new(module_id::ACCELEROMETER, accelerometer::DATA_VALUE, 0xff),
            offset: 4,
            length: 2,
        }
    }

    #[test]
    fn test_add_filter_layout() {
        let mut sink = Sink::new();
        sink.data_processor()
            .add_filter(accel_z(), &[0x02, 0x01])
            .unwrap();
        assert_eq!(
            sink.sent,
            vec![vec![0x09, 0x02, 0x03, 0x04, 0xff, 0x24, 0x02, 0x01]]
        );
    }

    #[test]
    fn test_add_two_shapes() {
        assert_eq!(
            decode(&[0x09, 0x02, 0x05]),
            Some(ModuleEvent::DataProcessor(DataProcessorEvent::FilterCreated { id: 5 }))
        );
        assert_eq!(
            decode(&[0x09, 0x82, 0x03, 0x04, 0xff, 0x24, 0x02, 0x01]),
            Some(ModuleEvent::DataProcessor(DataProcessorEvent::FilterConfig {
                source: accel_z(),
                config: vec![0x02, 0x01]
            }))
        );
    }

    #[test]
    fn test_filter_output() {
        assert_eq!(
            decode(&[0x09, 0x03, 0x05, 0xaa, 0xbb]),
            Some(ModuleEvent::DataProcessor(DataProcessorEvent::Output {
                id: 5,
                data: vec![0xaa, 0xbb]
            }))
        );
    }
}
