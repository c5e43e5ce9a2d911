pub use shared::{
    ApiError, CollectRequest, CollectibleCategory, CollectibleItem, CollectiblePoint,
    CollectionStats, Coordinate, InRangeResponse, LocationUpdate, NavigationInstruction,
    RouteDifficulty, RouteExportRequest, RouteExportResponse, RouteInfo, RoutePreview,
    RoutePreviewRequest, RouteSearchRequest, RouteSearchResponse, RouteType,
    SessionStartRequest, SessionStartResponse, SpecialRouteType, ThemeSummary, TransportType,
    default_transport_types,
};
