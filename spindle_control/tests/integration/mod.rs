mod calibration_props;
mod common;
mod config_reload;
mod selection;
mod transitions;
