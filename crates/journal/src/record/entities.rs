/// 거래 기록 엔티티 모듈
///
/// 예전 데이터와의 호환을 위해 서술형 컬럼은 대부분 NULL 을 허용하고,
/// 읽는 시점에 `normalize` 에서 기본값을 채운다.
pub mod trade {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "trades")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = true)]
        pub id: i64,

        /// 클라이언트 생성 멱등 키 (UUID)
        #[sea_orm(column_type = "Text", unique)]
        pub trade_key: String,

        #[sea_orm(column_type = "Text")]
        pub user_id: String,

        /// 진입 UTC 시간 (ISO 8601 형식)
        #[sea_orm(column_type = "Text")]
        pub entry_time: String,

        /// 청산 UTC 시간 (ISO 8601 형식)
        #[sea_orm(column_type = "Text", nullable)]
        pub exit_time: Option<String>,

        #[sea_orm(column_type = "Text", nullable)]
        pub ticker: Option<String>,

        #[sea_orm(column_type = "Text", nullable)]
        pub strategy_name: Option<String>,

        #[sea_orm(column_type = "Text", nullable)]
        pub strategy_detail: Option<String>,

        #[sea_orm(column_type = "Text", nullable)]
        pub mood: Option<String>,

        #[sea_orm(column_type = "Double")]
        pub start_balance: f64,

        #[sea_orm(column_type = "Double")]
        pub final_balance: f64,

        #[sea_orm(column_type = "Double", nullable)]
        pub profit: Option<f64>,

        #[sea_orm(column_type = "Double", nullable)]
        pub roi: Option<f64>,

        /// Win, Break-even, Loss
        #[sea_orm(column_type = "Text", nullable)]
        pub result_status: Option<String>,

        #[sea_orm(column_type = "Text", nullable)]
        pub review: Option<String>,

        #[sea_orm(nullable)]
        pub satisfaction: Option<i32>,

        #[sea_orm(column_type = "Text", nullable)]
        pub chart_url: Option<String>,

        #[sea_orm(column_type = "Double", nullable)]
        pub duration_minutes: Option<f64>,

        /// 메모 목록 (JSON 배열 문자열)
        #[sea_orm(column_type = "Text", nullable)]
        pub memos: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// 사용자 엔티티 모듈
pub mod user {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
        pub user_id: String,

        #[sea_orm(column_type = "Text")]
        pub password_hash: String,

        #[sea_orm(column_type = "Text")]
        pub salt: String,

        #[sea_orm(column_type = "Boolean")]
        pub is_premium: bool,

        /// 프리미엄 요청용 거래소 UID
        #[sea_orm(column_type = "Text", nullable)]
        pub exchange_uid: Option<String>,

        #[sea_orm(column_type = "Text")]
        pub created_at: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
