//! Chart protocol writer with a reusable output buffer.

use crate::catalog::MetricDescriptor;
use bytes::{BufMut, BytesMut};
use std::io::{self, Write};

/// CLABEL source flag: label set automatically by the plugin.
pub const LABEL_SOURCE_AUTO: u32 = 1;

/// Writer for the Netdata external plugin protocol.
///
/// Lines accumulate in a buffer that is reused across cycles and handed to the
/// output sink in one go by [`ChartWriter::flush_to`].
pub struct ChartWriter {
    buffer: BytesMut,
}

impl ChartWriter {
    /// Create a new chart writer with default capacity (4KB)
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Write a CHART command.
    ///
    /// `CHART type.id name title units family context charttype priority update_every options plugin`
    pub fn write_chart(
        &mut self,
        chart_id: &str,
        descriptor: &MetricDescriptor,
        update_every: u64,
        plugin: &str,
    ) {
        self.buffer.put_slice(b"CHART ");
        self.put_quoted(chart_id);
        self.buffer.put_slice(b" '' ");
        self.put_quoted(descriptor.title);
        self.buffer.put_u8(b' ');
        self.put_quoted(descriptor.units);
        self.buffer.put_u8(b' ');
        self.put_quoted(descriptor.family);
        self.buffer.put_u8(b' ');
        self.put_quoted(descriptor.context);
        self.buffer.put_u8(b' ');
        self.put_quoted(descriptor.chart_type.as_str());
        self.buffer.put_slice(b" '");
        self.write_u64(u64::from(descriptor.priority));
        self.buffer.put_slice(b"' '");
        self.write_u64(update_every);
        self.buffer.put_slice(b"' '' ");
        self.put_quoted(plugin);
        self.buffer.put_u8(b'\n');
    }

    /// Write a CLABEL command for the chart being declared
    pub fn write_label(&mut self, key: &str, value: &str) {
        self.buffer.put_slice(b"CLABEL ");
        self.put_quoted(key);
        self.buffer.put_u8(b' ');
        self.put_quoted(value);
        self.buffer.put_slice(b" '");
        self.write_u64(u64::from(LABEL_SOURCE_AUTO));
        self.buffer.put_slice(b"'\n");
    }

    pub fn commit_labels(&mut self) {
        self.buffer.put_slice(b"CLABEL_COMMIT\n");
    }

    /// Write a dimension definition (DIMENSION command)
    pub fn write_dimension_definition(&mut self, name: &str) {
        self.buffer.put_slice(b"DIMENSION ");
        self.put_quoted(name);
        self.buffer.put_u8(b'\n');
    }

    /// Begin a chart update (BEGIN command)
    pub fn begin_chart(&mut self, chart_id: &str) {
        self.buffer.put_slice(b"BEGIN ");
        self.buffer.put_slice(chart_id.as_bytes());
        self.buffer.put_u8(b'\n');
    }

    /// Write a dimension value (SET command).
    ///
    /// The value is passed through untouched, the agent parses it.
    pub fn write_dimension(&mut self, name: &str, value: &str) {
        self.buffer.put_slice(b"SET ");
        self.put_quoted(name);
        self.buffer.put_slice(b" = ");
        self.buffer.put_slice(value.as_bytes());
        self.buffer.put_u8(b'\n');
    }

    /// End a chart update (END command)
    pub fn end_chart(&mut self) {
        self.buffer.put_slice(b"END\n");
    }

    /// Write a single-quoted field.
    ///
    /// The protocol has no escape mechanism, so embedded single quotes are
    /// replaced by double quotes.
    fn put_quoted(&mut self, field: &str) {
        self.buffer.put_u8(b'\'');
        for (i, chunk) in field.split('\'').enumerate() {
            if i > 0 {
                self.buffer.put_u8(b'"');
            }
            self.buffer.put_slice(chunk.as_bytes());
        }
        self.buffer.put_u8(b'\'');
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        let mut buf = itoa::Buffer::new();
        let s = buf.format(value);
        self.buffer.put_slice(s.as_bytes());
    }

    /// Hand the buffered lines to `out`, flush it and clear the buffer
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.buffer)?;
        out.flush()?;
        self.buffer.clear();
        Ok(())
    }

    /// Get a reference to the buffer (for testing)
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for ChartWriter {
    fn default() -> Self {
        Self::new()
    }
}
