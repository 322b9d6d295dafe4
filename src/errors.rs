use color_eyre::Result;

pub fn init_errors() -> Result<()> {
    color_eyre::install()
}
