pub mod kill_switch;

pub use kill_switch::{AnyKillSwitch, EnvKillSwitch, FileKillSwitch, KillSwitch, MemoryKillSwitch};
