pub mod demux;
pub mod level_monitor;
