//! HTTP handler functions for the micro-zone API.

use actix_web::{HttpResponse, web};
use microzone_query::QueryError;
use microzone_query_models::MessageCode;
use microzone_server_models::{
    ApiHealth, ApiMessage, ApiMicrozone, ApiMicrozonePage, ApiSummary, MicrozoneQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        microzones: state.table.len(),
    })
}

/// `GET /api/microzonas`
///
/// Filtered, paged listing in key order.
pub async fn microzones(
    state: web::Data<AppState>,
    params: web::Query<MicrozoneQueryParams>,
) -> HttpResponse {
    let page = state
        .table
        .list(&params.filter(), params.pagination(state.default_limit));
    HttpResponse::Ok().json(ApiMicrozonePage::from(page))
}

/// `GET /api/microzonas/criticas`
///
/// `CRITICA` micro-zones, highest criticality index first.
pub async fn critical(
    state: web::Data<AppState>,
    params: web::Query<MicrozoneQueryParams>,
) -> HttpResponse {
    let page = state
        .table
        .critical(&params.filter(), params.pagination(state.default_limit));
    HttpResponse::Ok().json(ApiMicrozonePage::from(page))
}

/// `GET /api/microzonas/resumen`
pub async fn summary(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiSummary::from(state.table.summary()))
}

/// `GET /api/microzonas/{key}`
///
/// Accepts a rendered key (`ubigeo|year|month|zone`) or a bare UBIGEO.
pub async fn detail(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let requested = path.into_inner();
    match state.table.detail(&requested) {
        Ok(row) => HttpResponse::Ok().json(ApiMicrozone::from(row)),
        Err(QueryError::NotFound { .. }) => HttpResponse::NotFound()
            .json(ApiMessage::from(MessageCode::MicrozonaNoEncontrada.message())),
        Err(e) => {
            log::error!("Failed to look up micro-zone {requested}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to look up micro-zone"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use microzone_models::IndicatorRow;
    use microzone_query::MicrozoneTable;
    use microzone_query_models::CriticalityCriteria;
    use serde_json::Value;

    use super::*;
    use crate::configure;

    #[allow(clippy::cast_precision_loss)]
    fn row(ubigeo: &str, zone: &str, unit: &str, water: u64, sewage: u64) -> IndicatorRow {
        IndicatorRow {
            ubigeo: ubigeo.to_string(),
            district: zone.to_string(),
            year: Some(2024),
            month: Some(11),
            service_unit: Some(unit.to_string()),
            commercial_team: None,
            department: Some("LIMA".to_string()),
            province: Some("LIMA".to_string()),
            tariff: None,
            cutoff_date: None,
            water_connections: water,
            sewage_connections: sewage,
            water_primary_length: 10.0,
            water_secondary_length: 0.0,
            water_total_length: 10.0,
            sewage_primary_length: 0.0,
            sewage_secondary_length: 0.0,
            sewage_total_length: 0.0,
            project_count: 0,
            active_project_count: 0,
            mean_active_progress: None,
            total_project_cost: 0.0,
            sewage_ratio: sewage as f64 / water as f64,
            water_network_density: 10.0 / water as f64,
            sewage_network_density: 0.0,
            missing_project_data: true,
            missing_length_data: false,
            inconsistent_records: sewage > water,
        }
    }

    fn state() -> web::Data<AppState> {
        let table = MicrozoneTable::from_rows(
            vec![
                row("150103", "ATE", "GC CENTRO", 100, 0),
                row("150105", "BRENA", "GC CENTRO", 10, 12),
                row("150110", "COMAS", "GC NORTE", 50, 0),
                row("150114", "LA MOLINA", "GC ESTE", 100, 100),
            ],
            CriticalityCriteria {
                reference_connections: Some(100.0),
                ..CriticalityCriteria::default()
            },
        )
        .with_max_limit(3);
        web::Data::new(AppState {
            table,
            default_limit: 2,
        })
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let response = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = response.status();
        let body: Value = test::read_body_json(response).await;
        (status, body)
    }

    #[actix_web::test]
    async fn health_reports_loaded_rows() {
        let (status, body) = get_json("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["microzones"], 4);
    }

    #[actix_web::test]
    async fn listing_uses_default_limit() {
        let (status, body) = get_json("/api/microzonas").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);
        assert_eq!(body["pagination"]["limit"], 2);
        assert_eq!(body["microzones"].as_array().unwrap().len(), 2);
        assert_eq!(body["microzones"][0]["distrito"], "ATE");
    }

    #[actix_web::test]
    async fn listing_filters_and_clamps_limit() {
        let (_, body) =
            get_json("/api/microzonas?gerencia_servicios=gc%20centro&limit=50&offset=1").await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["pagination"]["limit"], 3);
        assert_eq!(body["microzones"][0]["distrito"], "BRENA");
        assert_eq!(body["filters"]["serviceUnit"], "gc centro");
        let codes: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|m| m["code"].as_str())
            .collect();
        assert!(codes.contains(&"RATIO_SUPERIOR_UNO"));
    }

    #[actix_web::test]
    async fn empty_result_carries_message() {
        let (_, body) = get_json("/api/microzonas?minConnections=1000").await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["messages"][0]["code"], "SIN_RESULTADOS");
    }

    #[actix_web::test]
    async fn critical_is_sorted_by_index() {
        let (status, body) = get_json("/api/microzonas/criticas?limit=10").await;
        assert_eq!(status, StatusCode::OK);
        let zones: Vec<&str> = body["microzones"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|m| m["distrito"].as_str())
            .collect();
        assert_eq!(zones, vec!["COMAS", "ATE"]);
        assert_eq!(body["microzones"][0]["indicators"]["category"], "CRITICA");
    }

    #[actix_web::test]
    async fn summary_counts_categories() {
        let (status, body) = get_json("/api/microzonas/resumen").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalMicrozones"], 4);
        assert_eq!(body["categories"]["CRITICA"], 2);
        assert_eq!(body["inconsistentRecords"], 1);
        assert_eq!(body["maxRatio"], 1.2);
    }

    #[actix_web::test]
    async fn detail_by_ubigeo_and_key() {
        let (status, body) = get_json("/api/microzonas/150110").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["distrito"], "COMAS");
        assert_eq!(body["key"], "150110|2024|11|COMAS");

        let (status, body) = get_json("/api/microzonas/150114%7C2024%7C11%7CLA%20MOLINA").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["distrito"], "LA MOLINA");
    }

    #[actix_web::test]
    async fn unknown_microzone_is_404() {
        let (status, body) = get_json("/api/microzonas/999999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "MICROZONA_NO_ENCONTRADA");
    }
}
