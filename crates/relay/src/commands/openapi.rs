use shared::error::CommonError;

pub fn cmd_openapi() -> Result<(), CommonError> {
    let spec = group_sync::router::get_openapi_spec();
    println!("{}", spec.to_pretty_json()?);
    Ok(())
}
