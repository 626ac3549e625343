pub mod create;
pub mod delete;
pub mod list;
pub mod read;

use anyhow::{Context, anyhow, bail};
use colored::Colorize;
use ovhflow_cloud::{AttributeValue, ResourceData};
use ovhflow_cloud_ovh::{OvhConfig, OvhProvider};

/// OVH_* 環境変数からプロバイダを構築
pub fn load_provider() -> anyhow::Result<OvhProvider> {
    let config = OvhConfig::from_env().context("OVH API の接続設定を読み込めません")?;
    let provider = OvhProvider::from_config(&config).context("OVH API クライアントを初期化できません")?;
    Ok(provider)
}

/// 属性を一覧表示
pub fn print_attributes(data: &ResourceData) {
    for (key, value) in data.attributes() {
        if key == "password" {
            println!("  {} = {}", key.dimmed(), "(sensitive)".dimmed());
        } else {
            println!("  {} = {}", key.dimmed(), value);
        }
    }
}

/// リソースタイプが対応済みか確認
pub fn ensure_known_type(resource_type: &str) -> anyhow::Result<()> {
    OvhProvider::reconciler(resource_type)?;
    Ok(())
}

/// `key=value` (文字列) または `key:=value` (JSON) を解析
pub fn parse_attribute(raw: &str) -> anyhow::Result<(String, AttributeValue)> {
    if let Some((key, json)) = raw.split_once(":=") {
        let value = match serde_json::from_str::<serde_json::Value>(json)
            .with_context(|| format!("JSON として解釈できません: {}", json))?
        {
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Number(n) => AttributeValue::Int(
                n.as_i64()
                    .ok_or_else(|| anyhow!("整数ではありません: {}", n))?,
            ),
            serde_json::Value::String(s) => AttributeValue::String(s),
            other => bail!("対応していない値です: {}", other),
        };
        return Ok((checked_key(key)?, value));
    }

    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("属性は key=value の形式で指定してください: {}", raw))?;
    Ok((checked_key(key)?, AttributeValue::String(value.to_string())))
}

fn checked_key(key: &str) -> anyhow::Result<String> {
    let key = key.trim();
    if key.is_empty() {
        bail!("属性名が空です");
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_attribute() {
        let (key, value) = parse_attribute("region=GRA1").unwrap();
        assert_eq!(key, "region");
        assert_eq!(value, AttributeValue::String("GRA1".to_string()));

        // 数字だけの名前も文字列のまま
        let (_, value) = parse_attribute("name=2024").unwrap();
        assert_eq!(value, AttributeValue::String("2024".to_string()));
    }

    #[test]
    fn test_parse_json_attribute() {
        assert_eq!(
            parse_attribute("size:=20").unwrap(),
            ("size".to_string(), AttributeValue::Int(20))
        );
        assert_eq!(
            parse_attribute("dhcp:=true").unwrap(),
            ("dhcp".to_string(), AttributeValue::Bool(true))
        );
        assert!(parse_attribute("size:=1.5").is_err());
        assert!(parse_attribute("regions:=[1]").is_err());
    }

    #[test]
    fn test_parse_invalid_attribute() {
        assert!(parse_attribute("region").is_err());
        assert!(parse_attribute("=GRA1").is_err());
    }
}
