use actix_cors::Cors;
use actix_web::http::header;

pub fn cors_middleware() -> Cors {
    // The browse API is read-only, so only GET is exposed
    Cors::default()
        .allowed_origin("http://localhost:3000")  // Map front end
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)  // Cache CORS preflight for 1 hour
}
