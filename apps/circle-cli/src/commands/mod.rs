pub mod group;
pub mod init;
pub mod sync;
pub mod usage;

pub use group::{
    cmd_group_create, cmd_group_join, cmd_group_leave, cmd_group_list, cmd_group_show,
    cmd_group_use,
};
pub use init::cmd_init;
pub use sync::cmd_sync;
pub use usage::{cmd_usage_add, cmd_usage_today, cmd_usage_week};

/// `1h 05m`, `12m 30s`, `45s`
pub fn format_seconds(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_seconds(45), "45s");
        assert_eq!(format_seconds(750), "12m 30s");
        assert_eq!(format_seconds(3900), "1h 05m");
    }
}
