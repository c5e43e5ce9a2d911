use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Walking,
    Driving,
    Transit,
}

impl TransportType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Walking => "步行",
            Self::Driving => "驾车",
            Self::Transit => "公交",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Fastest,
    Shortest,
    Cheapest,
    Scenic,
    Recommended,
    Alternative,
}

impl RouteType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fastest => "最快路线",
            Self::Shortest => "最短路线",
            Self::Cheapest => "最经济路线",
            Self::Scenic => "风景路线",
            Self::Recommended => "推荐路线",
            Self::Alternative => "备选路线",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDifficulty {
    Easy,
    Medium,
    Hard,
}

impl RouteDifficulty {
    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "轻松",
            Self::Medium => "适中",
            Self::Hard => "挑战",
        }
    }
}

/// Route theme chosen by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialRouteType {
    #[default]
    None,
    Scenic,
    Food,
    Attractions,
    Shopping,
    Cultural,
    Nature,
    Nightlife,
}

impl SpecialRouteType {
    pub const ALL: [SpecialRouteType; 8] = [
        Self::None,
        Self::Scenic,
        Self::Food,
        Self::Attractions,
        Self::Shopping,
        Self::Cultural,
        Self::Nature,
        Self::Nightlife,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Scenic => "scenic",
            Self::Food => "food",
            Self::Attractions => "attractions",
            Self::Shopping => "shopping",
            Self::Cultural => "cultural",
            Self::Nature => "nature",
            Self::Nightlife => "nightlife",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::None => "标准路线",
            Self::Scenic => "风景路线：途经公园、湖泊与观景点",
            Self::Food => "美食路线：串联特色餐厅与小吃街",
            Self::Attractions => "景点路线：经过热门旅游景点",
            Self::Shopping => "购物路线：穿过商圈与特色小店",
            Self::Cultural => "文化路线：探访博物馆与历史古迹",
            Self::Nature => "自然路线：沿绿道与山林前行",
            Self::Nightlife => "夜生活路线：夜市、酒吧与灯光秀",
        }
    }

    pub fn tags(self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Scenic => &["自然风光", "拍照打卡", "休闲漫步"],
            Self::Food => &["地道美食", "小吃", "咖啡"],
            Self::Attractions => &["热门景点", "地标", "历史"],
            Self::Shopping => &["商场", "步行街", "特色店铺"],
            Self::Cultural => &["博物馆", "古迹", "艺术"],
            Self::Nature => &["绿道", "山林", "湿地"],
            Self::Nightlife => &["酒吧", "夜市", "灯光秀"],
        }
    }
}

impl fmt::Display for SpecialRouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectibleCategory {
    Food,
    Scenic,
    Attraction,
    Landmark,
    Culture,
}

impl CollectibleCategory {
    pub const ALL: [CollectibleCategory; 5] = [
        Self::Food,
        Self::Scenic,
        Self::Attraction,
        Self::Landmark,
        Self::Culture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Scenic => "scenic",
            Self::Attraction => "attraction",
            Self::Landmark => "landmark",
            Self::Culture => "culture",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Food => "美食",
            Self::Scenic => "风景",
            Self::Attraction => "景点",
            Self::Landmark => "地标",
            Self::Culture => "文化",
        }
    }

    pub fn default_description(self) -> &'static str {
        match self {
            Self::Food => "发现地道美味",
            Self::Scenic => "欣赏美丽风景",
            Self::Attraction => "探索热门景点",
            Self::Landmark => "打卡城市地标",
            Self::Culture => "感受文化底蕴",
        }
    }

    pub fn icon_key(self) -> &'static str {
        match self {
            Self::Food => "fork.knife",
            Self::Scenic => "leaf.fill",
            Self::Attraction => "star.fill",
            Self::Landmark => "building.columns.fill",
            Self::Culture => "book.fill",
        }
    }
}

impl fmt::Display for CollectibleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown collectible category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for CollectibleCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationInstruction {
    pub id: Uuid,
    pub instruction_text: String,
    pub distance_text: String,
    pub icon_key: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub id: Uuid,
    pub route_type: RouteType,
    pub transport_type: TransportType,
    pub distance_text: String,
    pub duration_text: String,
    pub price_text: String,
    /// Provider geometry; absent for simulated routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline: Option<Vec<Coordinate>>,
    pub description: String,
    pub instructions: Vec<NavigationInstruction>,
    pub special_route_type: SpecialRouteType,
    pub highlights: Vec<String>,
    pub difficulty: RouteDifficulty,
}

/// Session-scoped collectible candidate. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectiblePoint {
    pub id: Uuid,
    pub name: String,
    pub category: CollectibleCategory,
    pub coordinate: Coordinate,
    pub description: String,
    pub is_collected: bool,
}

/// Durable record of a collected point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectibleItem {
    pub id: Uuid,
    pub name: String,
    pub category: CollectibleCategory,
    pub latitude: f64,
    pub longitude: f64,
    pub collected_at: DateTime<Utc>,
    pub route_type_tag: String,
    pub description: String,
    pub icon_key: String,
}

impl CollectibleItem {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total: usize,
    pub by_category: BTreeMap<CollectibleCategory, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSearchRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    #[serde(default = "default_transport_types")]
    pub transport_types: Vec<TransportType>,
    #[serde(default)]
    pub special_route_type: SpecialRouteType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSearchResponse {
    pub routes: Vec<RouteInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePreviewRequest {
    pub route: RouteInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_spacing_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePreview {
    pub path: Vec<Coordinate>,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteExportRequest {
    pub route: RouteInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteExportResponse {
    pub gpx_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub theme: SpecialRouteType,
    pub description: String,
    pub tags: Vec<String>,
    pub max_detour_percentage: u32,
    pub priority_keywords: Vec<String>,
    pub collectible_categories: Vec<CollectibleCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartRequest {
    pub route: RouteInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub session_id: Uuid,
    pub collectibles: Vec<CollectiblePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InRangeResponse {
    pub in_range: Vec<CollectiblePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectRequest {
    pub point_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_transport_types() -> Vec<TransportType> {
    vec![TransportType::Walking]
}
