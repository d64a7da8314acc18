use chrono::{DateTime, NaiveDate, Utc};

/// 全局统一的时间工具
pub struct TimeUtils;

impl TimeUtils {
    /// [标准] 获取当前 UTC 时间
    /// 全系统统一使用这个方法获取"现在"，方便未来 Mock 或做时钟偏移
    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// 今天 (UTC 日期)
    pub fn today() -> NaiveDate {
        Self::now().date_naive()
    }

    /// 截止时间是否不早于今天
    ///
    /// 只比较日期，当天任意时刻都算合法。
    pub fn is_on_or_after_today(deadline: &DateTime<Utc>) -> bool {
        deadline.date_naive() >= Self::today()
    }

    /// 保留两位小数
    pub fn round2(value: f64) -> f64 {
        (value * 100.0).round() / 100.0
    }
}
