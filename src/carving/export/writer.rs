use std::io::Write;

use crate::carving::common::error::Result;
use crate::carving::export::types::ExportConfig;

pub trait TiffWriter {
    fn write_gray8(&self, width: usize, height: usize, data: &[u8], output: &mut dyn Write, config: &ExportConfig) -> Result<()>;
    fn write_gray32f(&self, width: usize, height: usize, data: &[f32], output: &mut dyn Write, config: &ExportConfig) -> Result<()>;
}
