//! 仪表盘使用的 JavaScript 接口

use wasm_bindgen::prelude::*;
use web_sys::console;

use crate::models::{FilterRequest, SalesStore};
use crate::SalesFilter;

/// 销售筛选器JS接口 - 持有已加载的数据集
#[wasm_bindgen]
pub struct SalesFilterJS {
    store: SalesStore,
}

#[wasm_bindgen]
impl SalesFilterJS {
    /// 从快照字节初始化
    #[wasm_bindgen(constructor)]
    pub fn new(index_data: &[u8]) -> Result<SalesFilterJS, JsValue> {
        console_error_panic_hook::set_once();

        SalesStore::from_compressed(index_data)
            .map(|store| SalesFilterJS { store })
            .map_err(|e| report(format!("初始化筛选器失败: {e}")))
    }

    /// 版本信息
    pub fn version() -> String {
        crate::version().to_string()
    }

    /// 记录总数
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// 是否没有任何记录
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// 筛选销售记录，参数为仪表盘筛选对象的 JSON
    ///
    /// 非法的字段取值回退为默认值，只有 JSON 本身无法解析时才报错。
    pub fn query(&self, params_json: &str) -> Result<JsValue, JsValue> {
        let request = FilterRequest::from_json(params_json)
            .map_err(|e| report(format!("解析参数失败: {e}")))?;

        let page = SalesFilter::new(&self.store).query(&request);

        serde_wasm_bindgen::to_value(&page)
            .map_err(|e| report(format!("序列化结果失败: {e}")))
    }

    /// 获取筛选选项
    pub fn meta(&self) -> Result<JsValue, JsValue> {
        let meta = SalesFilter::new(&self.store).meta();

        serde_wasm_bindgen::to_value(&meta)
            .map_err(|e| report(format!("序列化筛选选项失败: {e}")))
    }
}

fn report(message: String) -> JsValue {
    let value = JsValue::from_str(&message);
    console::log_1(&value);
    value
}
