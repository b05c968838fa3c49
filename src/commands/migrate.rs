use crate::context::AppContext;
use anyhow::Result;
use log::info;

pub async fn run(app: &AppContext) -> Result<()> {
    let db = app.database().await?;
    db.ensure_schema().await?;
    info!("Prediction tables are ready");
    Ok(())
}
