use lingua_server::api::get_openapi_json;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or("openapi.json".to_string());
    std::fs::write(path, get_openapi_json()).unwrap();
}
