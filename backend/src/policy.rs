//! Theme policy: detour budgets, search keywords, collectible categories and
//! route narratives. Pure lookups, no state.

use crate::models::{
    CollectibleCategory, RouteDifficulty, SpecialRouteType, ThemeSummary, TransportType,
};

const EASY_LIMIT_M: f64 = 5_000.0;
const MEDIUM_LIMIT_M: f64 = 15_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteNarrative {
    pub description: String,
    pub highlights: Vec<String>,
    pub difficulty: RouteDifficulty,
}

pub fn max_detour_percentage(theme: SpecialRouteType) -> u32 {
    match theme {
        SpecialRouteType::None => 0,
        SpecialRouteType::Scenic | SpecialRouteType::Nature => 50,
        SpecialRouteType::Food | SpecialRouteType::Attractions | SpecialRouteType::Shopping => 30,
        SpecialRouteType::Cultural | SpecialRouteType::Nightlife => 25,
    }
}

/// Detour budget as a fraction, e.g. `0.5` for 50 %.
pub fn detour_fraction(theme: SpecialRouteType) -> f64 {
    f64::from(max_detour_percentage(theme)) / 100.0
}

pub fn priority_keywords(theme: SpecialRouteType) -> &'static [&'static str] {
    match theme {
        SpecialRouteType::None => &[],
        SpecialRouteType::Scenic => &["park", "lake", "river", "mountain", "garden", "viewpoint"],
        SpecialRouteType::Food => &["restaurant", "cafe", "food", "bakery", "street food", "market"],
        SpecialRouteType::Attractions => &[
            "museum",
            "landmark",
            "monument",
            "gallery",
            "tourist attraction",
            "temple",
        ],
        SpecialRouteType::Shopping => &["mall", "shopping", "market", "boutique", "store"],
        SpecialRouteType::Cultural => &["museum", "temple", "theater", "library", "historic site"],
        SpecialRouteType::Nature => &["park", "forest", "trail", "wetland", "botanical garden"],
        SpecialRouteType::Nightlife => &["bar", "night market", "club", "pub", "live music"],
    }
}

pub fn collectible_categories(theme: SpecialRouteType) -> &'static [CollectibleCategory] {
    use CollectibleCategory::*;
    match theme {
        SpecialRouteType::Food => &[Food, Culture],
        SpecialRouteType::Scenic => &[Scenic, Landmark],
        SpecialRouteType::Attractions => &[Attraction, Culture, Landmark],
        // TODO: shopping, cultural, nature and nightlife routes spawn no
        // collectibles; wire them to categories once product picks a mapping.
        SpecialRouteType::None
        | SpecialRouteType::Shopping
        | SpecialRouteType::Cultural
        | SpecialRouteType::Nature
        | SpecialRouteType::Nightlife => &[],
    }
}

/// Names used when no real place is resolved near a generated point.
pub fn fallback_names(category: CollectibleCategory) -> &'static [&'static str] {
    match category {
        CollectibleCategory::Food => &["老字号小馆", "街角面馆", "秘制烧烤摊", "传统点心铺", "巷子咖啡馆"],
        CollectibleCategory::Scenic => &["湖畔观景台", "林荫小道", "落日观景点", "城市花园", "河岸步道"],
        CollectibleCategory::Attraction => &["地标广场", "网红打卡点", "观光塔", "主题街区", "游客中心"],
        CollectibleCategory::Landmark => &["古城门", "钟楼", "纪念碑", "百年老桥", "城市雕塑"],
        CollectibleCategory::Culture => &["民俗博物馆", "非遗工坊", "老城书院", "艺术画廊", "戏曲茶馆"],
    }
}

/// Keywords for resolving a generated point against nearby real places.
pub fn category_search_keywords(category: CollectibleCategory) -> &'static [&'static str] {
    match category {
        CollectibleCategory::Food => &["餐厅", "小吃", "咖啡", "美食"],
        CollectibleCategory::Scenic => &["公园", "湖", "观景台", "花园"],
        CollectibleCategory::Attraction => &["景点", "广场", "游乐园"],
        CollectibleCategory::Landmark => &["地标", "塔", "纪念碑", "桥"],
        CollectibleCategory::Culture => &["博物馆", "美术馆", "寺", "书院"],
    }
}

pub fn difficulty_for_distance(distance_m: f64) -> RouteDifficulty {
    if distance_m < EASY_LIMIT_M {
        RouteDifficulty::Easy
    } else if distance_m < MEDIUM_LIMIT_M {
        RouteDifficulty::Medium
    } else {
        RouteDifficulty::Hard
    }
}

pub fn route_narrative(
    theme: SpecialRouteType,
    distance_m: f64,
    transport: TransportType,
    is_primary: bool,
) -> RouteNarrative {
    let (summary, highlights): (&str, &[&str]) = match (theme, is_primary) {
        (SpecialRouteType::None, true) => ("用时最短的常规路线", &["路线直接", "用时最短"]),
        (SpecialRouteType::None, false) => ("可避开拥堵路段的备选路线", &["避开拥堵"]),
        (SpecialRouteType::Scenic, true) => (
            "沿途风景优美，途经公园与水岸",
            &["城市公园", "湖畔步道", "最佳拍照点"],
        ),
        (SpecialRouteType::Scenic, false) => ("绕行观景台，视野更开阔", &["观景台", "林荫大道"]),
        (SpecialRouteType::Food, true) => (
            "串联本地人气餐厅与老字号",
            &["特色小吃", "老字号餐馆", "网红咖啡"],
        ),
        (SpecialRouteType::Food, false) => ("穿过美食街，边走边吃", &["美食街", "夜宵摊"]),
        (SpecialRouteType::Attractions, true) => (
            "一次打卡多个热门景点",
            &["热门景点", "城市地标", "纪念品店"],
        ),
        (SpecialRouteType::Attractions, false) => ("经过小众景点，人少景美", &["小众景点", "历史遗迹"]),
        (SpecialRouteType::Shopping, true) => (
            "途经大型商场与步行街",
            &["购物中心", "步行街", "品牌店"],
        ),
        (SpecialRouteType::Shopping, false) => ("探索创意市集与特色小店", &["创意市集", "特色小店"]),
        (SpecialRouteType::Cultural, true) => (
            "走进博物馆与历史街区",
            &["博物馆", "历史街区", "古建筑"],
        ),
        (SpecialRouteType::Cultural, false) => ("寻访书院、寺庙与艺术空间", &["书院", "艺术空间"]),
        (SpecialRouteType::Nature, true) => (
            "沿绿道穿行山林湿地",
            &["城市绿道", "森林公园", "湿地"],
        ),
        (SpecialRouteType::Nature, false) => ("绕行河岸与植物园", &["河岸", "植物园"]),
        (SpecialRouteType::Nightlife, true) => (
            "夜市、酒吧与灯光秀一路相伴",
            &["夜市", "酒吧街", "灯光秀"],
        ),
        (SpecialRouteType::Nightlife, false) => ("经过安静的清吧与夜景平台", &["清吧", "夜景平台"]),
    };

    RouteNarrative {
        description: format!("{summary}，适合{}", transport.label()),
        highlights: highlights.iter().map(|h| h.to_string()).collect(),
        difficulty: difficulty_for_distance(distance_m),
    }
}

pub fn theme_summary(theme: SpecialRouteType) -> ThemeSummary {
    ThemeSummary {
        theme,
        description: theme.description().to_string(),
        tags: theme.tags().iter().map(|t| t.to_string()).collect(),
        max_detour_percentage: max_detour_percentage(theme),
        priority_keywords: priority_keywords(theme)
            .iter()
            .map(|k| k.to_string())
            .collect(),
        collectible_categories: collectible_categories(theme).to_vec(),
    }
}

pub fn theme_catalog() -> Vec<ThemeSummary> {
    SpecialRouteType::ALL.into_iter().map(theme_summary).collect()
}
