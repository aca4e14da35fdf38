#[rocket::launch]
fn launch() -> _ {
    log::info!("Starting Hushzone API Server");
    hushzone_api::rocket()
}
