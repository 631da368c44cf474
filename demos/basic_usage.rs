//! # metaarray 使用案例
//!
//! 1. 构造带逐轴元数据的数组
//! 2. 混合索引：坐标值、列名、位置、按轴名定位
//! 3. 写入文件、分帧追加
//! 4. 内存映射读取并原地修改

use metaarray::{
    inspect, AxisDescriptor, ColumnDescriptor, ColumnName, Extra, ListItem, MetaArray,
    ReadOptions, Selector, WriteOptions,
};
use ndarray::{ArrayD, IxDyn};

fn main() -> metaarray::Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   metaarray 演示                                          ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 构造数组：trial × time × signal
    // =========================================================================
    println!("【1】构造数组 ...");
    let data = ArrayD::from_shape_fn(IxDyn(&[3, 6, 3]), |ix| {
        (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64
    });
    let mut info = Extra::new();
    info.insert("rig".into(), "setup-2".into());
    let ma = MetaArray::new(data, vec![
        AxisDescriptor::named("trial"),
        AxisDescriptor::named("time")
            .with_values((0..6).map(|t| t as f64 * 0.1).collect())
            .with_units("s"),
        AxisDescriptor::named("signal").with_cols(vec![
            ColumnDescriptor::new("Vm").with_units("mV"),
            ColumnDescriptor::new("Im").with_units("pA"),
            ColumnDescriptor::new(("stim", "cmd")).with_units("mV"),
        ]),
    ])?.with_info(info);
    println!("{ma}\n");

    // =========================================================================
    // 2. 索引
    // =========================================================================
    println!("【2】混合索引 ...");
    let vm = ma.select(&[Selector::named("signal", "Vm")])?;
    println!("    signal=Vm           → shape {:?}", vm.shape());

    let window = ma.select(&[
        Selector::Index(1),
        Selector::named("time", Selector::value_range(0.15, 0.45)),
    ])?;
    println!("    trial 1, 0.15..0.45 s → shape {:?}, times {:?}",
             window.shape(), window.axis_values(0)?);
    println!("    与源数组共享存储: {}", window.shares_buffer_with(&ma));

    let picked = ma.select(&[
        Selector::all(),
        Selector::all(),
        Selector::List(vec![ListItem::from("Im"), ListItem::from(ColumnName::from(("stim", "cmd")))]),
    ])?;
    println!("    列表选择 → columns {:?}, 拷贝: {}\n",
             picked.column_names(2)?, !picked.shares_buffer_with(&ma));

    // =========================================================================
    // 3. 写入与追加
    // =========================================================================
    let dir  = std::env::temp_dir().join("metaarray-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("trials.ma");
    let _ = std::fs::remove_file(&path);

    println!("【3】逐个 trial 追加到 {} ...", path.display());
    let opts = WriteOptions::new().append_axis("trial").mappable(true);
    for t in 0..3isize {
        ma.select(&[Selector::slice(t..t + 1)])?.write(&path, &opts)?;
    }
    let header = inspect(&path)?;
    println!("    dtype = {}, shape = {:?}, frames = {}",
             header.dtype, header.shape, header.frames.len());

    let back = MetaArray::<f64>::read(&path, &ReadOptions::new())?;
    println!("    读回与原数组一致: {}\n", back == ma);

    // =========================================================================
    // 4. 内存映射
    // =========================================================================
    println!("【4】内存映射并原地修改 ...");
    {
        let mut mapped = MetaArray::<f64>::read(&path, &ReadOptions::new().mmap(true).writable(true))?;
        mapped.data_mut()?[[2, 5, 0]] = -1.0;
        mapped.flush()?;
    }
    let back = MetaArray::<f64>::read(&path, &ReadOptions::new())?;
    println!("    trial 2, t=0.5 s, Vm = {}", back.view()[[2, 5, 0]]);
    println!("    ✓ OK");
    Ok(())
}
